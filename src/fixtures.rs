//! Pre-signed certificate strings and matching trust anchors shared by the
//! decoding and validation tests.
//!
//! All fixtures carry the same claim set (issuer `CZ`, subject JAN NOVAK,
//! born 1990-05-12, vaccinated 2/2 on 2021-06-01) and were signed with
//! throwaway test keys whose self-signed certificates are embedded below.

use crate::{decode, BlackListItem, BlackListStore, StoreError, TrustAnchor, TrustStore};

/// ES256-signed, zlib-compressed. The reference "happy path" fixture.
pub(crate) const ES256_VALID: &str = concat!(
    "HC1:NCFOXN%TSMAHN-HNQCP8NSNA6KJA8R0II.O1 434 JKHR/H2TZDC9B+4OY$GX6BMF6.UCSMI",
    "F0JEYI1DLNCKUCII7JSTNB9552609Q8+PPL73X70OR1KQCA7T5MSG4:ZJ::AZ 2AKPCPP0%MKU6Q",
    "W6-.QLR6VR5VVB5VA81K0ECM8CXVDC8C90JK.A+ C/8DXEDKG0CGJB/S7-SN2H N37J3JFTULJ5C",
    "BR/S09T./0LWTKD33236J3TA3%*47%S/U456L7Y48YIB731V0MX19UEOQ1:PIXHGO$98T5SIQY0Q",
    "$UPR$5:NLOEPNRAE69K PLIPQIMCG6.W2STLIRIUQ2XGABJ9TJEOTIWLICN53O8J.V J8$XJK*L5",
    "R14 JR L%S3./R8$BGYBK%JAXJ:P31/C/5W69U/WI4+EQ16YTNZ7J:.SZAM+VOZQF*5NOS8L5D61",
    "D T7MUKIJB1RV8:AFEASYGTQSI-A9VHNN81-9PR6OFNO.T.FMQVS+20R6JV3",
);

/// Same message as [`ES256_VALID`] but transported without zlib compression.
pub(crate) const ES256_UNCOMPRESSED: &str = concat!(
    "HC1:RRQT 9O60GO0ZNL:K2Z9EIK79CKV500XK0JC6HB2F3*4I400FI3B:GC10Y50.FK8ZKO/EZKE",
    "Z96446C56..DX%DZJC1/DM+9V+A%N9I3D%OCNB8LPCG/DE CF1AKB8MPCG/D%OCNB8JPCT3E5JDO",
    "A7346B464W5RG67:EDOL9WEQDD+Q6TW6FA7C466KCN9E%961A6DL6FA7D46.JCP9EJY8L/5M/554",
    "6.96VF6.JCBECB1A-:8$966469L6OF6VX6FVCPD0KQEPD0LVC6JD846Y96C463W5.A6UPC0JC8JB",
    "+EDP8FHZ95/D QEALEN44:+C%69AECAWEN44:+CAWEDZC*N8Z CG7DXIAY9E-JCOEDWJC0FDMK3A",
    "IA%G7X+AQB9746KG7DIB+F6K:61X6UL6BA6O4627B42FR:H/ZGEJ8GA4/LFHMQZUB/F1: I:A3KR",
    "U2XKC$UMA8 CDG.6PBF1XKLXGX9T44L/MQOX4I%A$78OTD:1WTXN5NH10VJO9",
);

/// [`ES256_VALID`] with one payload byte flipped. The signature no longer
/// matches.
pub(crate) const ES256_TAMPERED: &str = concat!(
    "HC1:NCFOXN%TSMAHN-HNQCP8NSNA6KJA8R0II.O1 434 JKHR/H2TZDC9B+4OY$GX6BMF6.UCSMI",
    "F0JEYI1DLNCKUCII7JSTNB9552609Q8+PPL73X70OR1KQCA7T5MSG4:ZJ::AZ 2AKPCPP0%MKU6Q",
    "W6-.QLR6VR5VVB5VA81K0ECM8CXVDC8C90JK.A+ C/8DXEDKG0CGJB/S7-SN2H N37J3JFTULJ5C",
    "BR/S09T./0LWTKD33236J3TA3%*47%S/U456L7Y48YIB731V0MX19UEOQ1:PIXHGO$98T5SIQY0Q",
    "$UPR$5:NLOEPNRAE69K PLIPQIMCG6.W2STLIRIUQ2XGABJ9TJEOTIWLICN53O8J.V J8$XJK*L5",
    "R14 JR L%S3./R8$BGYBK%JBXJNO342W$3UFT7IZVF8RI721DR*2QYW4SRUE8W7/PO*T4-BGZU31",
    "KSBQO8JUPNJ2OE/2: 5QYP9XFI64SJ78GE1BH5HEFKC-1V5FVE/V000G6OV*E",
);

/// Signed with the EC key but announcing algorithm -35 (ES384) in the
/// protected header.
pub(crate) const BAD_ALG: &str = concat!(
    "HC1:NCFOXNYTSFDHNI8-.OW-I09E8D8N1RUV0WVH9M9XTI4WKHXKTTV8939$K/ M4M6PF6R:5SVB",
    "WVBDKBYLDN4D74D$ZJ*DJWP42W5F1R.28DKQR95926MYPT/5+Y5NN0UCIZ0K*B0YE9-3AKI67ZML",
    "EQ 76UW6/G9YPDN*I4OIMEDTJCJKDLEDL9CZTAKBI/8D:8DKTDL+S/15A+2XEN QT QTHC31M3+E",
    "3+T4D-4HRVUMNMD3323623423.LJX/KQ968X2+36/-KKTC 509UE5%PAT1NTICZUQ1M6PPM4M+JU",
    "2+PFQ51C5EWAC1A.GUQ$9WC5.304H9/GAC JYJAQK6HLGAJ1 SIWH6NTI4L6LYK%UG/YL WO*Z7O",
    "N1T.L5VK3WH61QJT9NXHKW1JW12E49QPR1CZJUT9M*4O2RN9JLHZRS+IFNBXZFAD6PXIU0PW%1Q:",
    "1B+F02ORIVB9U* GN4A2XN2IBVCV9JKC7QE08S$UZ5NX3WUUH7WV0XV+00CAQ:0",
);

/// Carries the key identifier in both headers but no algorithm at all.
pub(crate) const NO_ALG: &str = concat!(
    "HC1:NCFOXN+TSQDINQCP8NSNA6KJA8R0II.O1 434 JKHR/H2TZDC9B+4OY$GX6BMF6.UCSMIF0J",
    "EYI1DLNCKUCII7JSTNB9552609Q8+PPL73X70OR1KQCA7T5MSG4:ZJ::AZ 2AKPCPP0%MKU6QW6-",
    ".QLR6VR5VVB5VA81K0ECM8CXVDC8C90JK.A+ C/8DXEDKG0CGJB/S7-SN2H N37J3JFTULJ5CBR/",
    "S09T./0LWTKD33236J3TA3%*47%S/U456L7Y48YIB731V0MX19UEOQ1:PIXHGO$98T5SIQY0Q$UP",
    "R$5:NLOEPNRAE69K PLIPQIMCG6.W2STLIRIUQ2XGABJ9TJEOTIWLICN53O8J.V J8$XJK*L5R14",
    " JR L%S3./R8$BGYBK%JAXJ0R3KZ8 UI*DUJ%1$3K 75$6GTL9YKCWBD50C5QB9RVAV27RN835SN",
    "FEFLBIEIZK:XOQMNP.Q+4GX9M%ZQ02JJ%C.XOT DCM50-F6SP/S1BK85-E",
);

/// The protected header names a bogus key identifier, the unprotected
/// header carries the real one. The merge must let the unprotected entry
/// win for verification to succeed.
pub(crate) const KID_UNPROTECTED_WINS: &str = concat!(
    "HC1:NCFOXN%TSMAHN-HCPGHC1DPM*%LR$2$E5*XMHH3VGP1WGXJPZLHNH5/BSIFG*RT.NB3QGNO4",
    "*J8/Y4F%CD 810H% 0R%0IGF5JNBPIOSU+4W/TOL/N3UQZOI-T3CPIGSU424TNP8EFG9CP$I/XK$",
    "M8XL96YBBOAZO8:%OD3P5B9-NT0 2$$0X4PCY0+-CVYCDEBD0HX2JR$4O1K.IA.C8KRDL4O54O4I",
    "GUJKJGI.IAHLCV5GVWNZIKXGG JMLII7EDTG90OA3DE0OARH9W/IO6AHCR6W9FDON95N14$SRP+P",
    "8C17DS2*N.SSBNKA.G.P6A8IM%O%KI$42QP4%$AHINZW6+L8Q65HBK595IL6N95ZTM5G7HHP4F5G",
    "+P%YQ+GOJPPTSPJHP5-RJ+QOIR5IQ8DO PO+JD5MMSVVS1U0*JPXF/X2QKRT:4BYO.1KTVMNVFYF",
    "J0N2L83K$C/*E/D7Q%I0VJ09MTA276O 0TD5LQ9Q.CMEBRU1AOXAKZL7BIA4UO303JL$1",
);

/// PS256-signed with the RSA test key, same claims as [`ES256_VALID`].
pub(crate) const PS256_VALID: &str = concat!(
    "HC1:NCFA60NG0/3WUWGSLKH47GO01U27DKM5IY779CKV500XK0JC6HB2F3*4I400FI3B:GC10Y50",
    ".FK8ZKO/EZKEZ96446C56..DX%DZJC1/DM+9V+A%N9I3D%OCNB8LPCG/DE CF1AKB8MPCG/D%OCN",
    "B8JPCT3E5JDOA7346B464W5RG67:EDOL9WEQDD+Q6TW6FA7C466KCN9E%961A6DL6FA7D46.JCP9",
    "EJY8L/5M/5546.96VF6.JCBECB1A-:8$966469L6OF6VX6FVCPD0KQEPD0LVC6JD846Y96C463W5",
    ".A6UPC0JC8JB+EDP8FHZ95/D QEALEN44:+C%69AECAWEN44:+CAWEDZC*N8Z CG7DXIAY9E-JCO",
    "EDWJC0FDMK3AIA%G7X+AQB9746KG7DIB+F6K:61X6UL6BA6O46FBB6102WP*2QI-S.92LZDKHO82",
    "T2SI.*VA$2Q$HO1PQ/N.EK*E7GFNGUQGVR0A3HUL59TQEL 9H+HAX GN:V$-89KDLIE6GW0/D Z0",
    "5.LIJ7HSOZHLKP6*1L+XLA77*G1U6LZ1K+7POZSQ*1TWA1WHGK0YMV.:QFEI7QQO$IO*H:HH%3JX",
    "1DJD4A7RFO0BJ5UQ8DR2X$FLLGD$P+O7W0L$7JBW787V-WJVO54R01$U%FVRMD0 FRA1BZ0A56 .",
    "E*:Q4TB*/KR.Q-/PPA2ED4*D0$18K1TBD4OBDQT3RUN7SC4N80-C4B9EJL4NRMERH4T:1J2N1ZN2",
    "*KO07B+OAT4AELOHEW I7K0QPOA/INJHNB*VE9KYYKKKS/GGGSBP%I-DUS0V%LBY2",
);

pub(crate) const EC_KID_B64: &str = "qksTgnB2OvU=";
pub(crate) const RSA_KID_B64: &str = "FRmghI9ZOLw=";

pub(crate) const EC_ANCHOR_PEM: &str = "\
-----BEGIN CERTIFICATE-----\n\
MIIBSzCB8qADAgECAhR5x4mHgnEMVmu3TeoTJIsK5bzkHTAKBggqhkjOPQQDAjAl\n\
MRYwFAYDVQQDDA1EQ0MgVGVzdCBDU0NBMQswCQYDVQQGEwJDWjAgFw0yMTAxMDEw\n\
MDAwMDBaGA8yMDk5MDEwMTAwMDAwMFowJTEWMBQGA1UEAwwNRENDIFRlc3QgQ1ND\n\
QTELMAkGA1UEBhMCQ1owWTATBgcqhkjOPQIBBggqhkjOPQMBBwNCAARkUXRBrsw6\n\
q+cYl589Z8R26SIZOTZ8QF297UPGK3cI9mamwmKTCu6ci5YCfYTHBRPKutyTeJBg\n\
e4NBwbiN52vLMAoGCCqGSM49BAMCA0gAMEUCIQC29Lh2q9ARjQG7SZNGrX7kMsZ+\n\
63ymTSOArTT2WKwDIwIgVZCicizg/1bitKQDOH8dkI+a1wqwM79fK4cJbPmbOTM=\n\
-----END CERTIFICATE-----\n\
";

pub(crate) const RSA_ANCHOR_PEM: &str = "\
-----BEGIN CERTIFICATE-----\n\
MIIC2DCCAcCgAwIBAgIUB+Yof1GMzj6ez897RhCUCpjckHYwDQYJKoZIhvcNAQEL\n\
BQAwJTEWMBQGA1UEAwwNRENDIFRlc3QgQ1NDQTELMAkGA1UEBhMCQ1owIBcNMjEw\n\
MTAxMDAwMDAwWhgPMjA5OTAxMDEwMDAwMDBaMCUxFjAUBgNVBAMMDURDQyBUZXN0\n\
IENTQ0ExCzAJBgNVBAYTAkNaMIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKC\n\
AQEA1hf5wGHdHg0Ootzhif8V+tgICjj6USPs/dioCbpqODmOlsS4OyplogOg4a3e\n\
/aq74PvHuLCmvhBEYLoVc4HqzS6BbMS8CcfFLgYYJ2wgfCldFmnTBGN5JCMfXIsy\n\
C1gohCPfnIORbTr9Zmuc5MRnTARA06xKH9pQPPIF7NI/WDW44Z0dS4Q9tUagRur0\n\
UAdDW81onfw7vb7iGxNuB+NLkM2rkG2lE4nvYc75maanRVvz0sNEiVwHUXZ5yyAC\n\
7UJRZy4sLl89+NznQ0c+D34zm6akhfK47dHv3lWPBeatUusKBvT0xHcFiQA+7nIm\n\
lGvrpKl3gFp7GPnl7JPeXYJ+ZwIDAQABMA0GCSqGSIb3DQEBCwUAA4IBAQBMddAh\n\
nZS8m4lzWKKGwUn8J0ADSImcDlCKD/hAw7vWd6RLb3bgpRcykyhuovv6IpnrisIA\n\
P4J1C+lrXimOjvo8d+pllihERU6RD7c+WGW5YrFzdHgOREBJGm6FosH+6+2sxsd0\n\
ukc+cvMAZbyWfNbaOZVUQCi9049EAo5N8gQkFL9CmdBBO51MsQwXXSPIlOR/aM+M\n\
SFlHvbuNE9lYsOttOeZvRIpgGt5SLDh/Pvayf57ryW+F0Qw/s5W6NhLENrHyAtzZ\n\
arAWIDr8ObwQpX9CNRRm9Vz2DIlZudikTHy5zO63bsR31ewY+xxgKuXuaCqZ85Zi\n\
U8XlqpprygtE21TK\n\
-----END CERTIFICATE-----\n\
";

/// Strips the transport envelope of a fixture, yielding the raw COSE bytes.
pub(crate) fn transport(raw: &str) -> Vec<u8> {
    decode::unwrap_transport(raw).expect("fixture transport layer decodes")
}

pub(crate) fn ec_anchor() -> TrustAnchor {
    TrustAnchor {
        certificate_type: "CSCA".to_string(),
        country: "CZ".to_string(),
        kid: EC_KID_B64.to_string(),
        certificate_pem: EC_ANCHOR_PEM.to_string(),
        active: true,
        change_id: 1,
    }
}

pub(crate) fn rsa_anchor() -> TrustAnchor {
    TrustAnchor {
        certificate_type: "CSCA".to_string(),
        country: "CZ".to_string(),
        kid: RSA_KID_B64.to_string(),
        certificate_pem: RSA_ANCHOR_PEM.to_string(),
        active: true,
        change_id: 2,
    }
}

/// Trust store over a fixed anchor list.
pub(crate) struct MemoryTrustStore(pub(crate) Vec<TrustAnchor>);

impl MemoryTrustStore {
    pub(crate) fn with_test_anchors() -> Self {
        MemoryTrustStore(vec![ec_anchor(), rsa_anchor()])
    }
}

impl TrustStore for MemoryTrustStore {
    fn trust_anchor_by_kid(&self, kid: &str) -> Result<Option<TrustAnchor>, StoreError> {
        Ok(self.0.iter().find(|anchor| anchor.kid == kid).cloned())
    }
}

/// Blacklist store over a fixed item list.
pub(crate) struct MemoryBlackListStore(pub(crate) Vec<BlackListItem>);

impl BlackListStore for MemoryBlackListStore {
    fn items_by_cert_id(&self, certificate_id: &str) -> Result<Vec<BlackListItem>, StoreError> {
        Ok(self
            .0
            .iter()
            .filter(|item| item.certificate_id == certificate_id)
            .cloned()
            .collect())
    }
}

/// Store whose every lookup fails, for error-propagation tests.
pub(crate) struct BrokenStore;

impl TrustStore for BrokenStore {
    fn trust_anchor_by_kid(&self, _kid: &str) -> Result<Option<TrustAnchor>, StoreError> {
        Err(StoreError::new("backing database is unreachable"))
    }
}

impl BlackListStore for BrokenStore {
    fn items_by_cert_id(&self, _certificate_id: &str) -> Result<Vec<BlackListItem>, StoreError> {
        Err(StoreError::new("backing database is unreachable"))
    }
}
