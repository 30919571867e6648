use crate::{
    config::Config,
    error::{AppError, Result},
    models::media::{ImageUpload, ImageUploadResponse},
    services::Database,
    utils::slug::sanitize_file_name,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const DEFAULT_EXTENSION: &str = "png";

#[derive(Clone)]
pub struct MediaService {
    db: Arc<Database>,
    bucket: String,
    max_upload_size: usize,
}

impl MediaService {
    pub async fn new(config: &Config, db: Arc<Database>) -> Result<Self> {
        Ok(Self {
            db,
            bucket: config.blog_images_bucket.clone(),
            max_upload_size: config.max_image_upload_size,
        })
    }

    /// 检查文件类型和大小
    pub fn validate(&self, upload: Option<&ImageUpload>) -> Result<()> {
        let upload = upload.ok_or_else(|| AppError::validation("Image file is required."))?;

        if !upload.content_type.starts_with("image/") {
            return Err(AppError::validation("Only image uploads are allowed."));
        }
        if upload.data.len() > self.max_upload_size {
            return Err(AppError::Validation(format!(
                "Image must be {} or smaller.",
                size_label(self.max_upload_size)
            )));
        }
        Ok(())
    }

    /// 上传博客图片并返回公开地址
    pub async fn upload_blog_image(&self, upload: Option<ImageUpload>) -> Result<ImageUploadResponse> {
        self.validate(upload.as_ref())?;
        let Some(upload) = upload else {
            return Err(AppError::validation("Image file is required."));
        };

        let path = object_path(&upload.file_name, Utc::now(), Uuid::new_v4());
        let dimensions = imagesize::blob_size(&upload.data).ok();
        debug!("Uploading image {} ({} bytes, {:?})", path, upload.data.len(), dimensions);

        self.db
            .upload_object(&self.bucket, &path, upload.data, &upload.content_type)
            .await?;

        let url = self.db.public_object_url(&self.bucket, &path);
        info!("Uploaded blog image: {}", url);

        Ok(ImageUploadResponse {
            url,
            path,
            bucket: self.bucket.clone(),
            width: dimensions.as_ref().map(|size| size.width),
            height: dimensions.as_ref().map(|size| size.height),
        })
    }
}

fn size_label(bytes: usize) -> String {
    const MB: usize = 1024 * 1024;
    const KB: usize = 1024;

    if bytes >= MB && bytes % MB == 0 {
        format!("{}MB", bytes / MB)
    } else if bytes >= KB && bytes % KB == 0 {
        format!("{}KB", bytes / KB)
    } else {
        format!("{} bytes", bytes)
    }
}

/// `posts/<YYYY-MM-DD>/<uuid>-<stem>.<ext>`
pub fn object_path(file_name: &str, now: DateTime<Utc>, id: Uuid) -> String {
    let (stem, extension) = match file_name.rsplit_once('.') {
        Some((stem, ext)) => (stem, clean_extension(ext)),
        None => (file_name, DEFAULT_EXTENSION.to_string()),
    };

    format!(
        "posts/{}/{}-{}.{}",
        now.format("%Y-%m-%d"),
        id,
        sanitize_file_name(stem),
        extension
    )
}

fn clean_extension(raw: &str) -> String {
    let ext: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();

    if ext.is_empty() {
        DEFAULT_EXTENSION.to_string()
    } else {
        ext
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{header, method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // 1x1 PNG
    const PNG_PIXEL: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
        0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
        0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
        0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
        0x42, 0x60, 0x82,
    ];

    async fn service(server_uri: &str) -> MediaService {
        service_with_limit(server_uri, 5 * 1024 * 1024).await
    }

    async fn service_with_limit(server_uri: &str, max_upload_size: usize) -> MediaService {
        let mut config = Config::for_store(server_uri, "key");
        config.max_image_upload_size = max_upload_size;
        let db = Arc::new(Database::new(&config).await.unwrap());
        MediaService::new(&config, db).await.unwrap()
    }

    fn upload(name: &str, content_type: &str, data: Vec<u8>) -> ImageUpload {
        ImageUpload {
            file_name: name.to_string(),
            content_type: content_type.to_string(),
            data,
        }
    }

    #[test]
    fn test_object_path() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let id = Uuid::nil();

        assert_eq!(
            object_path("My Cover Photo.JPG", now, id),
            format!("posts/2024-03-09/{}-my-cover-photo.jpg", id)
        );
        assert_eq!(object_path("banner", now, id), format!("posts/2024-03-09/{}-banner.png", id));
        assert_eq!(object_path("###.webp", now, id), format!("posts/2024-03-09/{}-image.webp", id));
        assert_eq!(object_path("archive.tar.gz", now, id), format!("posts/2024-03-09/{}-archive.tar.gz", id));
    }

    #[tokio::test]
    async fn test_validation_messages() {
        let media = service("http://127.0.0.1:9").await;

        let err = media.validate(None).unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Image file is required.");

        let err = media.validate(Some(&upload("a.pdf", "application/pdf", vec![1]))).unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Only image uploads are allowed.");

        let too_big = upload("a.png", "image/png", vec![0; 5 * 1024 * 1024 + 1]);
        let err = media.validate(Some(&too_big)).unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Image must be 5MB or smaller.");

        let exact = upload("a.png", "image/png", vec![0; 5 * 1024 * 1024]);
        assert!(media.validate(Some(&exact)).is_ok());
    }

    #[tokio::test]
    async fn test_size_message_follows_configured_limit() {
        let media = service_with_limit("http://127.0.0.1:9", 2 * 1024 * 1024).await;
        let err = media
            .validate(Some(&upload("a.png", "image/png", vec![0; 2 * 1024 * 1024 + 1])))
            .unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Image must be 2MB or smaller.");

        let media = service_with_limit("http://127.0.0.1:9", 512 * 1024).await;
        let err = media
            .validate(Some(&upload("a.png", "image/png", vec![0; 512 * 1024 + 1])))
            .unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Image must be 512KB or smaller.");

        assert_eq!(size_label(1000), "1000 bytes");
    }

    #[tokio::test]
    async fn test_upload_returns_public_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/storage/v1/object/blog-images/posts/\d{4}-\d{2}-\d{2}/.+-pixel\.png$"))
            .and(header("x-upsert", "false"))
            .and(header("content-type", "image/png"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let media = service(&server.uri()).await;
        let response = media
            .upload_blog_image(Some(upload("Pixel.png", "image/png", PNG_PIXEL.to_vec())))
            .await
            .unwrap();

        assert_eq!(response.bucket, "blog-images");
        assert!(response.url.starts_with(&format!("{}/storage/v1/object/public/blog-images/posts/", server.uri())));
        assert!(response.url.ends_with(&response.path));
        assert_eq!((response.width, response.height), (Some(1), Some(1)));
    }
}
