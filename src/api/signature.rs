use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::BotError;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 of the canonical query string
pub fn sign(query: &str, secret: &str) -> Result<String, BotError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| BotError::Configuration(format!("invalid API secret: {}", e)))?;
    mac.update(query.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// `key=value` pairs joined with `&`, form-encoded, in insertion order
pub fn canonical_query(params: &[(&str, String)]) -> Result<String, BotError> {
    serde_urlencoded::to_string(params)
        .map_err(|e| BotError::Configuration(format!("unencodable query: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_signature() {
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";

        assert_eq!(
            sign(query, secret).unwrap(),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_signed_query_matches_known_vector() {
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        let query = canonical_query(&[
            ("symbol", "LTCBTC".to_string()),
            ("side", "BUY".to_string()),
            ("type", "LIMIT".to_string()),
            ("timeInForce", "GTC".to_string()),
            ("quantity", "1".to_string()),
            ("price", "0.1".to_string()),
            ("recvWindow", "5000".to_string()),
            ("timestamp", "1499827319559".to_string()),
        ])
        .unwrap();

        assert_eq!(
            sign(&query, secret).unwrap(),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_canonical_query_keeps_order_and_encodes() {
        let query = canonical_query(&[
            ("symbol", "XRPUSDT".to_string()),
            ("quantity", "12.5".to_string()),
            ("note", "a b/c".to_string()),
        ])
        .unwrap();
        assert_eq!(query, "symbol=XRPUSDT&quantity=12.5&note=a+b%2Fc");
    }
}
