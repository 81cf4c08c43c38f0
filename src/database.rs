use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::num::ParseIntError;
use std::path::Path;
use std::time::Instant;

use log::{info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::fingerprint::Fingerprint;

/// 数据库中的一条记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    /// 图片的 URL 或路径，不保证唯一
    pub identifier: String,
    pub fingerprint: Fingerprint,
}

impl Entry {
    pub fn new(identifier: impl Into<String>, fingerprint: Fingerprint) -> Self {
        Self { identifier: identifier.into(), fingerprint }
    }

    /// 解析一行记录，格式为 `<identifier> <fingerprint>`
    pub fn parse(line: &str) -> Result<Self, MalformedRecord> {
        let fields = line.split_whitespace().collect::<Vec<_>>();
        let [identifier, fingerprint] = fields[..] else {
            return Err(MalformedRecord::FieldCount(fields.len()));
        };
        let fingerprint = fingerprint.parse().map_err(|source| MalformedRecord::Fingerprint {
            value: fingerprint.to_owned(),
            source,
        })?;
        Ok(Self::new(identifier, fingerprint))
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.identifier, self.fingerprint)
    }
}

/// 无法解析的数据库记录，加载时会被跳过
#[derive(Debug, Error)]
pub enum MalformedRecord {
    #[error("应有 2 个字段，实际为 {0} 个")]
    FieldCount(usize),
    #[error("无法解析指纹 \"{value}\": {source}")]
    Fingerprint {
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("不是有效的 UTF-8 文本")]
    Encoding,
}

/// 标识符不能为空，也不能包含空白字符，否则写出的记录无法被再次读取
pub fn is_valid_identifier(identifier: &str) -> bool {
    !identifier.is_empty() && !identifier.chars().any(char::is_whitespace)
}

/// 按加载顺序保存的图片指纹集合
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Database {
    entries: Vec<Entry>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从文本流中加载数据库
    ///
    /// 格式错误的行会被记录并跳过，只有读取本身出错时才会返回错误
    pub fn load<R: BufRead>(mut reader: R) -> io::Result<Self> {
        let mut db = Self::new();
        let mut buf = Vec::new();
        let mut line_no = 0;
        let mut skipped = 0;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            line_no += 1;

            let record = std::str::from_utf8(&buf)
                .map_err(|_| MalformedRecord::Encoding)
                .and_then(Entry::parse);
            match record {
                Ok(entry) => db.entries.push(entry),
                Err(e) => {
                    warn!("第 {} 行无效，已跳过: {}", line_no, e);
                    skipped += 1;
                }
            }
        }

        if skipped != 0 {
            warn!("共跳过 {} 行无效记录", skipped);
        }
        Ok(db)
    }

    /// 打开数据库文件
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        info!("正在加载数据库: {}", path.display());

        let start = Instant::now();
        let db = Self::load(BufReader::new(File::open(path)?))?;
        info!("数据库加载完成，共 {} 张图片，耗时 {:.2?}", db.len(), start.elapsed());

        Ok(db)
    }

    /// 将所有记录按顺序写出
    pub fn persist<W: Write>(&self, writer: W) -> io::Result<()> {
        let mut writer = BufWriter::new(writer);
        for entry in &self.entries {
            write_entry(&mut writer, entry)?;
        }
        writer.flush()
    }

    pub fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }
}

impl FromIterator<Entry> for Database {
    fn from_iter<T: IntoIterator<Item = Entry>>(iter: T) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

impl<'a> IntoIterator for &'a Database {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn write_entry<W: Write>(writer: &mut W, entry: &Entry) -> io::Result<()> {
    if !is_valid_identifier(&entry.identifier) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("无效的标识符: {:?}", entry.identifier),
        ));
    }
    writeln!(writer, "{}", entry)
}

/// 只追加的数据库写入器，每次写入一行并立即刷新
#[derive(Debug)]
pub struct DatabaseWriter<W: Write> {
    inner: W,
    written: usize,
}

impl DatabaseWriter<File> {
    /// 创建数据库文件，已存在的文件会被清空
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::new(File::create(path)?))
    }

    /// 打开数据库文件并在末尾追加记录
    pub fn append_to(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write> DatabaseWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// 写入一条记录
    ///
    /// 整行先在内存中拼好再一次性写出，保证不会出现半行
    pub fn append(&mut self, entry: &Entry) -> io::Result<()> {
        let mut line = Vec::with_capacity(entry.identifier.len() + 22);
        write_entry(&mut line, entry)?;
        self.inner.write_all(&line)?;
        self.inner.flush()?;
        self.written += 1;
        Ok(())
    }

    /// 已写入的记录数量
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
