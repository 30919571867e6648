use crate::{
    error::{AppError, Result},
    models::blog::*,
    services::Database,
    utils::{
        markdown::{MarkdownProcessor, RenderedContent},
        validation::{validate_blog_payload, validate_category_payload},
    },
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

const POSTS_TABLE: &str = "blog_posts";
const CATEGORIES_TABLE: &str = "blog_categories";

#[derive(Clone)]
pub struct BlogService {
    db: Arc<Database>,
    markdown_processor: MarkdownProcessor,
}

impl BlogService {
    pub async fn new(db: Arc<Database>) -> Result<Self> {
        Ok(Self {
            db,
            markdown_processor: MarkdownProcessor::new(),
        })
    }

    /// 所有文章，最近更新的在前
    pub async fn list_posts(&self) -> Result<Vec<BlogPost>> {
        self.db
            .from(POSTS_TABLE)
            .select(BLOG_POST_COLUMNS)
            .order("updated_at", false)
            .fetch()
            .await
    }

    pub async fn get_post(&self, id: &str) -> Result<BlogPost> {
        debug!("Getting blog post: {}", id);

        self.db
            .from(POSTS_TABLE)
            .select(BLOG_POST_COLUMNS)
            .eq("id", id)
            .maybe_single()
            .await?
            .ok_or_else(|| AppError::not_found("Blog post not found"))
    }

    /// 检查 slug 是否已被其他文章占用
    async fn ensure_slug_available(&self, slug: &str, exclude_id: Option<&str>) -> Result<()> {
        let query = self.db.from(POSTS_TABLE).select("id").eq("slug", slug);
        let query = match exclude_id {
            Some(id) => query.neq("id", id),
            None => query,
        };

        let existing: Option<IdRow> = query.limit(1).maybe_single().await?;
        if existing.is_some() {
            return Err(AppError::conflict("Slug already exists. Use a different slug."));
        }
        Ok(())
    }

    pub async fn create_post(&self, payload: BlogPayload) -> Result<BlogPost> {
        let data = validate_blog_payload(payload, &self.markdown_processor, Utc::now())?;
        self.ensure_slug_available(&data.slug, None).await?;

        let post: BlogPost = self.db.insert(POSTS_TABLE, &data, BLOG_POST_COLUMNS).await?;
        info!("Created blog post: {} ({})", post.slug, post.id);
        Ok(post)
    }

    /// 更新文章；已发布的文章保留首次发布时间，改回草稿时清空
    pub async fn update_post(&self, id: &str, payload: BlogPayload) -> Result<BlogPost> {
        let now = Utc::now();
        let mut data = validate_blog_payload(payload, &self.markdown_processor, now)?;
        self.ensure_slug_available(&data.slug, Some(id)).await?;

        let existing: PublishedAtRow = self
            .db
            .from(POSTS_TABLE)
            .select("published_at")
            .eq("id", id)
            .maybe_single()
            .await?
            .ok_or_else(|| AppError::not_found("Blog post not found"))?;

        data.published_at = if data.status.is_published() {
            Some(existing.published_at.unwrap_or(now))
        } else {
            None
        };
        data.updated_at = Some(now);

        let post: BlogPost = self
            .db
            .update_by_id(POSTS_TABLE, id, &data, BLOG_POST_COLUMNS)
            .await?
            .ok_or_else(|| AppError::not_found("Blog post not found"))?;

        info!("Updated blog post: {}", id);
        Ok(post)
    }

    pub async fn delete_post(&self, id: &str) -> Result<()> {
        self.db.delete_by_id(POSTS_TABLE, id).await?;
        info!("Deleted blog post: {}", id);
        Ok(())
    }

    pub async fn list_categories(&self) -> Result<Vec<BlogCategory>> {
        self.db
            .from(CATEGORIES_TABLE)
            .select(BLOG_CATEGORY_COLUMNS)
            .order("name", true)
            .fetch()
            .await
    }

    pub async fn create_category(&self, payload: CategoryPayload) -> Result<BlogCategory> {
        let category = validate_category_payload(&payload)?;

        match self
            .db
            .insert::<_, BlogCategory>(CATEGORIES_TABLE, &category, BLOG_CATEGORY_COLUMNS)
            .await
        {
            Ok(created) => {
                info!("Created blog category: {}", created.slug);
                Ok(created)
            }
            Err(AppError::Database(e)) if e.is_unique_violation() => {
                Err(AppError::conflict("Category slug already exists"))
            }
            Err(e) => Err(e),
        }
    }

    /// 编辑器实时预览
    pub fn preview(&self, markdown: &str) -> RenderedContent {
        self.markdown_processor.render(markdown)
    }
}
