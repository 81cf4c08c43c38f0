use std::future::Future;
use std::io::Cursor;
use std::time::Duration;

use image::{DynamicImage, ImageReader};
use reqwest::{Client, StatusCode};
use tokio::task::spawn_blocking;

use super::task::IndexError;
use crate::utils::is_url;

/// 图片来源，根据路径或 URL 获取图片的原始数据
pub trait ImageSource: Send + Sync + 'static {
    fn fetch(&self, reference: &str) -> impl Future<Output = Result<Vec<u8>, IndexError>> + Send;
}

/// 从本地文件系统读取图片
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSource;

impl ImageSource for FileSource {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, IndexError> {
        Ok(tokio::fs::read(reference).await?)
    }
}

/// 通过 HTTP GET 下载图片
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl ImageSource for HttpSource {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, IndexError> {
        let resp = self.client.get(reference).send().await?;
        if resp.status() != StatusCode::OK {
            return Err(IndexError::Status(resp.status().as_u16()));
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

/// 根据引用的格式选择来源：http(s) 地址走网络，其余视为本地路径
#[derive(Debug, Clone)]
pub struct AutoSource {
    http: HttpSource,
}

impl AutoSource {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        Ok(Self { http: HttpSource::new(timeout)? })
    }
}

impl ImageSource for AutoSource {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, IndexError> {
        if is_url(reference) {
            self.http.fetch(reference).await
        } else {
            FileSource.fetch(reference).await
        }
    }
}

/// 获取图片数据，超过 `timeout` 视为获取失败
pub async fn fetch_with_timeout<S: ImageSource>(
    source: &S,
    reference: &str,
    timeout: Option<Duration>,
) -> Result<Vec<u8>, IndexError> {
    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, source.fetch(reference))
            .await
            .map_err(|_| IndexError::Timeout(timeout))?,
        None => source.fetch(reference).await,
    }
}

/// 在阻塞线程池中解码图片，格式由文件内容推断
pub async fn decode(bytes: Vec<u8>) -> Result<DynamicImage, IndexError> {
    spawn_blocking(move || -> Result<DynamicImage, IndexError> {
        let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
        Ok(reader.decode()?)
    })
    .await?
}

/// 获取并解码图片
pub async fn fetch_and_decode<S: ImageSource>(
    source: &S,
    reference: &str,
    timeout: Option<Duration>,
) -> Result<DynamicImage, IndexError> {
    let bytes = fetch_with_timeout(source, reference, timeout).await?;
    decode(bytes).await
}
