// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Easel-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Easel and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

// Data directory helpers: on-disk record shapes (owned for reading, borrowed for writing)
// and symlink-refusing atomic writes.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountsFileJson {
    #[serde(default)]
    accounts: Vec<AccountJson>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountJson {
    account_id: AccountId,
    first_seen_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccountsFileRef<'a> {
    accounts: Vec<AccountRef<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccountRef<'a> {
    account_id: &'a AccountId,
    first_seen_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeasesFileJson {
    #[serde(default)]
    leases: Vec<ActiveLease>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LeasesFileRef<'a> {
    leases: Vec<&'a ActiveLease>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountersJson {
    #[serde(default)]
    next_version_id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestFileJson {
    account_id: AccountId,
    #[serde(flatten)]
    scene: Scene,
    #[serde(default)]
    diagram_name: Option<String>,
    updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LatestFileRef<'a> {
    account_id: &'a AccountId,
    #[serde(flatten)]
    scene: &'a Scene,
    diagram_name: Option<&'a str>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionsFileJson {
    account_id: AccountId,
    #[serde(default)]
    versions: Vec<VersionSnapshot>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VersionsFileRef<'a> {
    account_id: &'a AccountId,
    versions: Vec<VersionRowRef<'a>>,
}

#[derive(Serialize)]
struct VersionRowRef<'a> {
    #[serde(flatten)]
    summary: &'a VersionSummary,
    #[serde(flatten)]
    scene: &'a Scene,
}

fn read_json_if_exists<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, StoreError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(source) if source.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(StoreError::Io { path: path.to_path_buf(), source }),
    };

    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| StoreError::Json { path: path.to_path_buf(), source })
}

/// `*.json` files directly under `dir`, sorted; leftover temp files are skipped.
fn list_json_files(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(source) if source.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(StoreError::Io { path: dir.to_path_buf(), source }),
    };

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| StoreError::Io { path: dir.to_path_buf(), source })?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if name.starts_with(TMP_PREFIX) || !name.ends_with(".json") {
            continue;
        }
        let md = fs::symlink_metadata(&path)
            .map_err(|source| StoreError::Io { path: path.clone(), source })?;
        if md.file_type().is_symlink() {
            return Err(StoreError::SymlinkRefused { path });
        }
        if md.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn remove_file_if_exists(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(source) if source.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(StoreError::Io { path: path.to_path_buf(), source }),
    }
}

fn validate_relative_path(field: &'static str, path: &Path) -> Result<(), StoreError> {
    if path.as_os_str().is_empty() || path.is_absolute() {
        return Err(StoreError::InvalidRelativePath { field, value: path.to_path_buf() });
    }

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::ParentDir => {
                return Err(StoreError::InvalidRelativePath { field, value: path.to_path_buf() });
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }

    Ok(())
}

fn to_relative_path(root: &Path, path: &Path, field: &'static str) -> Result<PathBuf, StoreError> {
    let relative = path.strip_prefix(root).map(PathBuf::from).map_err(|_| {
        StoreError::PathOutsideDataDir { root: root.to_path_buf(), path: path.to_path_buf() }
    })?;

    validate_relative_path(field, &relative)?;
    Ok(relative)
}

fn create_dir_all_safe(root: &Path, relative: &Path) -> Result<(), StoreError> {
    if relative.as_os_str().is_empty() {
        return Ok(());
    }

    validate_relative_path("dir", relative)?;

    let mut current = root.to_path_buf();
    for component in relative.components() {
        let Component::Normal(part) = component else {
            continue;
        };

        current.push(part);

        match fs::symlink_metadata(&current) {
            Ok(md) if md.file_type().is_symlink() => {
                return Err(StoreError::SymlinkRefused { path: current });
            }
            Ok(md) if !md.is_dir() => {
                return Err(StoreError::Io {
                    path: current,
                    source: io::Error::new(io::ErrorKind::AlreadyExists, "expected directory"),
                });
            }
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                fs::create_dir(&current)
                    .map_err(|source| StoreError::Io { path: current.clone(), source })?;
            }
            Err(source) => return Err(StoreError::Io { path: current, source }),
        }
    }

    Ok(())
}

fn rename_overwrite(from: &Path, to: &Path) -> io::Result<()> {
    #[cfg(windows)]
    {
        match fs::rename(from, to) {
            Ok(()) => Ok(()),
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::AlreadyExists | io::ErrorKind::PermissionDenied
                ) =>
            {
                let _ = fs::remove_file(to);
                fs::rename(from, to)
            }
            Err(err) => Err(err),
        }
    }

    #[cfg(not(windows))]
    {
        fs::rename(from, to)
    }
}

/// Writes `contents` to `path` (inside `root`) via a sibling temp file and an atomic rename.
fn write_atomic_in_data_dir(
    root: &Path,
    path: &Path,
    contents: &[u8],
    durability: WriteDurability,
) -> Result<(), StoreError> {
    fs::create_dir_all(root)
        .map_err(|source| StoreError::Io { path: root.to_path_buf(), source })?;

    let relative = to_relative_path(root, path, "path")?;
    let parent_rel = relative.parent().unwrap_or_else(|| Path::new(""));
    create_dir_all_safe(root, parent_rel)?;

    match fs::symlink_metadata(path) {
        Ok(md) if md.file_type().is_symlink() => {
            return Err(StoreError::SymlinkRefused { path: path.to_path_buf() });
        }
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(source) => return Err(StoreError::Io { path: path.to_path_buf(), source }),
    }

    let (Some(parent), Some(file_name)) = (path.parent(), path.file_name()) else {
        return Err(StoreError::Io {
            path: path.to_path_buf(),
            source: io::Error::other("path has no parent or file name"),
        });
    };

    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
    let tmp_name =
        format!("{TMP_PREFIX}{}.{}.{nanos}", file_name.to_string_lossy(), std::process::id());
    let tmp_path = parent.join(tmp_name);

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&tmp_path)
        .map_err(|source| StoreError::Io { path: tmp_path.clone(), source })?;

    let written = file.write_all(contents).and_then(|()| {
        if durability == WriteDurability::Durable {
            file.sync_all()
        } else {
            Ok(())
        }
    });
    drop(file);
    if let Err(source) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(StoreError::Io { path: tmp_path, source });
    }

    if let Err(source) = rename_overwrite(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(StoreError::Io { path: path.to_path_buf(), source });
    }

    if durability == WriteDurability::Durable {
        #[cfg(unix)]
        {
            let dir = fs::File::open(parent)
                .map_err(|source| StoreError::Io { path: parent.to_path_buf(), source })?;
            dir.sync_all().map_err(|source| StoreError::Io { path: parent.to_path_buf(), source })?;
        }
    }

    Ok(())
}
