//! 디렉토리 해석 -- `<root>/<host>/<component>-<port>/<file>` 트리 스캔

use std::fs;
use std::path::{Path, PathBuf};

use foresight_core::types::Component;
use tracing::warn;

use crate::error::LogSearchError;

/// 로그 파일 서술자
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// 스캔 루트
    pub root: PathBuf,
    /// 호스트 디렉토리 이름 (IP)
    pub host: String,
    /// `<component>-<port>` 폴더 이름
    pub folder: String,
    /// 파일 이름
    pub filename: String,
}

impl FileDescriptor {
    /// 새 서술자를 생성합니다.
    pub fn new(
        root: impl Into<PathBuf>,
        host: impl Into<String>,
        folder: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            host: host.into(),
            folder: folder.into(),
            filename: filename.into(),
        }
    }

    /// 파일의 전체 경로
    pub fn path(&self) -> PathBuf {
        self.root
            .join(&self.host)
            .join(&self.folder)
            .join(&self.filename)
    }

    /// 폴더 이름을 `(컴포넌트, 포트)`로 분해합니다.
    ///
    /// 형식은 맞지만 알 수 없는 컴포넌트(`pump-8250` 등)는 `None` 컴포넌트입니다.
    pub fn parse_folder(&self) -> Result<(Option<Component>, u16), LogSearchError> {
        parse_folder_name(&self.folder)
    }
}

/// `<component>-<port>` 폴더 이름을 분해합니다.
pub fn parse_folder_name(folder: &str) -> Result<(Option<Component>, u16), LogSearchError> {
    let malformed = || LogSearchError::FolderName {
        folder: folder.to_owned(),
    };
    if folder.starts_with('.') {
        return Err(malformed());
    }
    let (name, port) = folder.split_once('-').ok_or_else(malformed)?;
    if name.is_empty() {
        return Err(malformed());
    }
    let port = port.parse::<u16>().map_err(|_| malformed())?;
    Ok((Component::from_name(name), port))
}

/// 스캔 결과
#[derive(Debug, Default)]
pub struct Resolved {
    /// 발견된 파일
    pub files: Vec<FileDescriptor>,
    /// 스캔을 중단하지 않은 폴더 단위 에러
    pub errors: Vec<LogSearchError>,
}

/// 루트 디렉토리 아래 정확히 세 단계 깊이의 일반 파일을 모두 찾습니다.
///
/// 중간 단계의 디렉토리가 아닌 항목은 무시합니다. 숨김 폴더나 형식이 맞지
/// 않는 폴더는 [`Resolved::errors`]에 기록되고 스캔은 계속됩니다.
/// 루트나 호스트 디렉토리를 읽지 못하면 에러를 반환합니다.
pub fn resolve_dir(root: impl AsRef<Path>) -> Result<Resolved, LogSearchError> {
    let root = root.as_ref();
    let mut resolved = Resolved::default();

    for host_entry in sorted_entries(root)? {
        if !host_entry.is_dir() {
            continue;
        }
        let Some(host) = file_name(&host_entry) else {
            continue;
        };
        for folder_entry in sorted_entries(&host_entry)? {
            if !folder_entry.is_dir() {
                continue;
            }
            let Some(folder) = file_name(&folder_entry) else {
                continue;
            };
            if let Err(e) = parse_folder_name(&folder) {
                warn!(host = %host, folder = %folder, "skipping malformed log folder");
                resolved.errors.push(e);
                continue;
            }
            let files = match sorted_entries(&folder_entry) {
                Ok(files) => files,
                Err(e) => {
                    resolved.errors.push(e);
                    continue;
                }
            };
            for file_entry in files {
                if !file_entry.is_file() {
                    continue;
                }
                if let Some(filename) = file_name(&file_entry) {
                    resolved.files.push(FileDescriptor::new(
                        root,
                        host.clone(),
                        folder.clone(),
                        filename,
                    ));
                }
            }
        }
    }

    Ok(resolved)
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, LogSearchError> {
    let read = fs::read_dir(dir).map_err(|e| LogSearchError::Resolve {
        path: dir.display().to_string(),
        reason: e.to_string(),
    })?;
    let mut entries = Vec::new();
    for entry in read {
        let entry = entry.map_err(|e| LogSearchError::Resolve {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(ToOwned::to_owned)
}
