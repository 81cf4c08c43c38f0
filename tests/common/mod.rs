#![allow(dead_code)]

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, ImageFormat, Luma};

/// 三张指纹各不相同的测试图片：从左到右变亮、从右到左变亮、竖条纹
pub fn test_images() -> Vec<DynamicImage> {
    let ramp = DynamicImage::ImageLuma8(GrayImage::from_fn(90, 80, |x, _| Luma([x as u8 * 2])));
    let stripes = DynamicImage::ImageLuma8(GrayImage::from_fn(90, 80, |x, _| {
        Luma([if (x / 10) % 2 == 0 { 230 } else { 20 }])
    }));
    vec![ramp.clone(), ramp.fliph(), stripes]
}

pub fn png_bytes(image: &DynamicImage) -> Vec<u8> {
    let mut buf = Cursor::new(vec![]);
    image.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// 在目录中写入三张可以解码的图片和一个损坏的文件，返回图片路径
pub fn write_dataset(dir: &Path) -> Vec<PathBuf> {
    let mut paths = vec![];
    for (i, image) in test_images().iter().enumerate() {
        let path = dir.join(format!("{}.png", i));
        image.save(&path).unwrap();
        paths.push(path);
    }
    std::fs::write(dir.join("corrupt.jpg"), b"definitely not a jpeg").unwrap();
    paths
}
