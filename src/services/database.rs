use crate::config::Config;
use crate::error::{AppError, Result, StoreError};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{header, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info};

/// Supabase 数据服务（PostgREST + Storage + Auth Admin）
#[derive(Clone)]
pub struct Database {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl Database {
    /// 创建新的数据库实例
    pub async fn new(config: &Config) -> Result<Self> {
        info!("Initializing store client for {}", config.supabase_url);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            service_key: config.supabase_service_role_key.clone(),
        })
    }

    /// 验证数据库连接
    pub async fn verify_connection(&self) -> Result<()> {
        let response = self
            .request(Method::GET, &format!("{}/rest/v1/", self.base_url))
            .send()
            .await?;

        match check(response).await {
            Ok(_) => {
                info!("Store connection verified successfully");
                Ok(())
            }
            Err(e) => {
                error!("Failed to verify store connection: {}", e);
                Err(e)
            }
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// 使用查询构建器创建查询
    pub fn from(&self, table: &str) -> Query<'_> {
        Query {
            db: self,
            table: table.to_string(),
            params: Vec::new(),
        }
    }

    /// 插入一条记录并返回插入后的行
    pub async fn insert<T, R>(&self, table: &str, data: &T, columns: &str) -> Result<R>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        debug!("Inserting into {}", table);

        let response = self
            .request(Method::POST, &self.table_url(table))
            .query(&[("select", columns)])
            .header("Prefer", "return=representation")
            .json(data)
            .send()
            .await?;

        let rows: Vec<R> = check(response).await?.json().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::Internal(format!("insert into {} returned no rows", table)))
    }

    /// 按 id 更新记录，记录不存在时返回 None
    pub async fn update_by_id<T, R>(&self, table: &str, id: &str, data: &T, columns: &str) -> Result<Option<R>>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        debug!("Updating {} id={}", table, id);

        let response = self
            .request(Method::PATCH, &self.table_url(table))
            .query(&[("id", format!("eq.{}", id)), ("select", columns.to_string())])
            .header("Prefer", "return=representation")
            .json(data)
            .send()
            .await?;

        let rows: Vec<R> = check(response).await?.json().await?;
        Ok(rows.into_iter().next())
    }

    /// 通过ID删除记录
    pub async fn delete_by_id(&self, table: &str, id: &str) -> Result<()> {
        debug!("Deleting from {} id={}", table, id);

        let response = self
            .request(Method::DELETE, &self.table_url(table))
            .query(&[("id", format!("eq.{}", id))])
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }

    /// 调用数据库函数
    pub async fn rpc<A, R>(&self, function: &str, args: &A) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .request(Method::POST, &format!("{}/rest/v1/rpc/{}", self.base_url, function))
            .json(args)
            .send()
            .await?;

        Ok(check(response).await?.json().await?)
    }

    /// 上传文件到存储桶，不覆盖已有对象
    pub async fn upload_object(&self, bucket: &str, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        debug!("Uploading {} bytes to {}/{}", bytes.len(), bucket, path);

        let response = self
            .request(
                Method::POST,
                &format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, encode_object_path(path)),
            )
            .header(header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }

    pub fn public_object_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, bucket, encode_object_path(path))
    }

    /// 通过 Auth Admin API 统计用户数
    pub async fn count_auth_users(&self) -> Result<u64> {
        #[derive(Deserialize)]
        struct UserList {
            #[serde(default)]
            users: Vec<Value>,
        }

        let response = self
            .request(Method::GET, &format!("{}/auth/v1/admin/users", self.base_url))
            .send()
            .await?;

        let list: UserList = check(response).await?.json().await?;
        Ok(list.users.len() as u64)
    }
}

/// PostgREST 查询构建器
pub struct Query<'a> {
    db: &'a Database,
    table: String,
    params: Vec<(String, String)>,
}

impl<'a> Query<'a> {
    pub fn select(mut self, columns: &str) -> Self {
        self.params.push(("select".to_string(), columns.to_string()));
        self
    }

    fn filter(mut self, column: &str, operator: &str, value: &str) -> Self {
        self.params.push((column.to_string(), format!("{}.{}", operator, value)));
        self
    }

    pub fn eq(self, column: &str, value: &str) -> Self {
        self.filter(column, "eq", value)
    }

    pub fn neq(self, column: &str, value: &str) -> Self {
        self.filter(column, "neq", value)
    }

    pub fn gte(self, column: &str, value: DateTime<Utc>) -> Self {
        self.filter(column, "gte", &format_timestamp(value))
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.params.push(("order".to_string(), format!("{}.{}", column, direction)));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.params.push(("limit".to_string(), limit.to_string()));
        self
    }

    /// 执行查询并返回所有行
    pub async fn fetch<T: DeserializeOwned>(self) -> Result<Vec<T>> {
        debug!("Querying {} {:?}", self.table, self.params);

        let response = self
            .db
            .request(Method::GET, &self.db.table_url(&self.table))
            .query(&self.params)
            .send()
            .await?;

        Ok(check(response).await?.json().await?)
    }

    /// 执行查询并返回第一行
    pub async fn maybe_single<T: DeserializeOwned>(self) -> Result<Option<T>> {
        let rows: Vec<T> = self.fetch().await?;
        Ok(rows.into_iter().next())
    }

    /// 精确计数，不返回行数据
    pub async fn count(self) -> Result<u64> {
        let response = self
            .db
            .request(Method::HEAD, &self.db.table_url(&self.table))
            .query(&self.params)
            .header("Prefer", "count=exact")
            .send()
            .await?;

        let response = check(response).await?;
        response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| AppError::Internal(format!("count on {} returned no Content-Range", self.table)))
    }
}

/// 对象路径逐段编码，保留分隔符
fn encode_object_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `0-24/3573` 或 `*/3573` 中的总数
pub fn parse_content_range_total(raw: &str) -> Option<u64> {
    raw.rsplit_once('/')?.1.trim().parse().ok()
}

/// 非 2xx 响应转换为 StoreError
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let mut store_error = serde_json::from_str::<StoreError>(&body).unwrap_or_else(|_| StoreError {
        status: 0,
        code: None,
        message: body.clone(),
        details: None,
        hint: None,
    });
    store_error.status = status.as_u16();

    Err(AppError::Database(store_error))
}
