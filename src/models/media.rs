use serde::{Deserialize, Serialize};

pub const IMAGE_FIELD_NAME: &str = "image";

/// 上传的图片文件
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageUploadResponse {
    pub url: String,
    pub path: String,
    pub bucket: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<usize>,
}
