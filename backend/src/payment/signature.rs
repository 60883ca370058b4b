use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute HMAC-SHA256 over `message` and return it as lowercase hex.
pub fn sign(secret: &str, message: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a hex signature over `message`.
pub fn verify(secret: &str, message: &[u8], signature_hex: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(message);
    mac.verify_slice(&expected).is_ok()
}

/// Checkout callback signature: HMAC of `"{order_id}|{payment_id}"` with the key secret.
pub fn verify_payment(secret: &str, order_id: &str, payment_id: &str, signature_hex: &str) -> bool {
    verify(secret, format!("{}|{}", order_id, payment_id).as_bytes(), signature_hex)
}

/// Webhook signature: HMAC of the raw request body with the webhook secret.
pub fn verify_webhook(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    verify(secret, body, signature_hex)
}
