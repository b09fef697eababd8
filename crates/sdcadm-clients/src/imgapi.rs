//! Image API client

use crate::http::HttpApi;
use sdcadm_core::{ClientError, Image};
use std::time::Duration;

/// IMGAPI over HTTP
#[derive(Debug, Clone)]
pub struct ImgapiHttp {
    api: HttpApi,
}

impl ImgapiHttp {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            api: HttpApi::new("imgapi", base_url, timeout)?,
        })
    }

    /// Image manifest by uuid
    pub async fn get_image(&self, uuid: &str) -> Result<Image, ClientError> {
        self.api.get(&format!("/images/{uuid}"), &[]).await
    }
}

#[cfg(test)]
mod tests {
    use crate::http::{decode_error, decode_response};
    use sdcadm_core::{ClientError, Image};

    #[test]
    fn decodes_manifest() {
        let body = br#"{
            "v": 2,
            "uuid": "img-1",
            "name": "cn-agent",
            "version": "2.0.0",
            "state": "active"
        }"#;
        let image: Image = decode_response(200, body).unwrap();
        assert_eq!(image, Image::new("img-1", "cn-agent", "2.0.0"));
    }

    #[test]
    fn missing_image_is_api_error() {
        let body = br#"{"code": "ResourceNotFound", "message": "image img-x not found"}"#;
        let err = decode_error(404, body);
        assert!(matches!(err, ClientError::Api { status: 404, .. }));
        assert_eq!(err.to_string(), "image img-x not found");
    }
}
