//! QR label URLs. Images are rendered by an external endpoint; only the
//! request URL is composed here.

use crate::config::QrConfig;

/// `<endpoint>?size=<n>x<n>&data=<url-encoded data>`
pub fn qr_code_url(endpoint: &str, size: u32, data: &str) -> String {
    format!(
        "{}?size={}x{}&data={}",
        endpoint,
        size,
        size,
        urlencoding::encode(data)
    )
}

impl QrConfig {
    pub fn url_for(&self, data: &str) -> String {
        qr_code_url(&self.endpoint, self.size, data)
    }
}
