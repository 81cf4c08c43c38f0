use std::fmt;

use clap::ValueEnum;
use image::DynamicImage;
use image::imageops::FilterType;
use thiserror::Error;

/// 图片指纹，固定为 64 位
pub type Fingerprint = u64;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("图片尺寸无效: {0}x{1}")]
    EmptyImage(u32, u32),
}

/// 图片指纹算法
///
/// 实现必须是无状态的：相同的图片总是得到相同的指纹，`distance` 满足对称性，
/// 且只有在两个指纹被认为相同时才返回 0。
pub trait FingerprintProvider: Send + Sync {
    /// 计算图片的指纹
    fn hash(&self, image: &DynamicImage) -> Result<Fingerprint, HashError>;

    /// 计算两个指纹之间的距离，越小越相似
    fn distance(&self, a: Fingerprint, b: Fingerprint) -> f64;
}

#[inline(always)]
pub fn hamming(a: Fingerprint, b: Fingerprint) -> u32 {
    (a ^ b).count_ones()
}

/// 差值哈希：缩放到 9x8 的灰度图后比较相邻像素
#[derive(Debug, Clone, Copy, Default)]
pub struct DHash;

impl FingerprintProvider for DHash {
    fn hash(&self, image: &DynamicImage) -> Result<Fingerprint, HashError> {
        check_size(image)?;
        let gray = image.resize_exact(9, 8, FilterType::Triangle).to_luma8();

        let mut hash = 0;
        for row in gray.as_raw().chunks_exact(9) {
            for j in 0..8 {
                hash <<= 1;
                hash |= (row[j] < row[j + 1]) as u64;
            }
        }
        Ok(hash)
    }

    fn distance(&self, a: Fingerprint, b: Fingerprint) -> f64 {
        hamming(a, b) as f64
    }
}

/// 均值哈希：缩放到 8x8 的灰度图后与平均亮度比较
#[derive(Debug, Clone, Copy, Default)]
pub struct AHash;

impl FingerprintProvider for AHash {
    fn hash(&self, image: &DynamicImage) -> Result<Fingerprint, HashError> {
        check_size(image)?;
        let gray = image.resize_exact(8, 8, FilterType::Triangle).to_luma8();
        let pixels = gray.as_raw();
        let sum = pixels.iter().map(|&p| p as u32).sum::<u32>();

        // 与 sum / 64 比较，但避免整数除法丢失精度
        let mut hash = 0;
        for &p in pixels {
            hash <<= 1;
            hash |= (p as u32 * 64 > sum) as u64;
        }
        Ok(hash)
    }

    fn distance(&self, a: Fingerprint, b: Fingerprint) -> f64 {
        hamming(a, b) as f64
    }
}

fn check_size(image: &DynamicImage) -> Result<(), HashError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(HashError::EmptyImage(image.width(), image.height()));
    }
    Ok(())
}

/// 命令行可选的指纹算法
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FingerprintKind {
    /// 差值哈希
    #[default]
    Dhash,
    /// 均值哈希
    Ahash,
}

impl FingerprintProvider for FingerprintKind {
    fn hash(&self, image: &DynamicImage) -> Result<Fingerprint, HashError> {
        match self {
            Self::Dhash => DHash.hash(image),
            Self::Ahash => AHash.hash(image),
        }
    }

    fn distance(&self, a: Fingerprint, b: Fingerprint) -> f64 {
        match self {
            Self::Dhash => DHash.distance(a, b),
            Self::Ahash => AHash.distance(a, b),
        }
    }
}

impl fmt::Display for FingerprintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dhash => write!(f, "dhash"),
            Self::Ahash => write!(f, "ahash"),
        }
    }
}
