use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

use domain_submission::exception::{SubmissionException, SubmissionResult};
use domain_submission::model::vo::NamedBytes;
use domain_submission::service::ArchiveUnpackService;

/// Container-format extraction keyed on content sniffing, never on the
/// submitted filename.
pub struct ArchiveUnpackServiceImpl;

impl ArchiveUnpackService for ArchiveUnpackServiceImpl {
    fn unpack(&self, bytes: &[u8], password: &str) -> SubmissionResult<Vec<NamedBytes>> {
        let mime = infer::get(bytes)
            .map(|kind| kind.mime_type())
            .unwrap_or("application/octet-stream");
        let members = match mime {
            "application/zip" => unpack_zip(bytes, password)?,
            "application/vnd.rar" | "application/x-rar-compressed" => {
                unpack_rar(bytes, password)?
            }
            "application/x-7z-compressed" => unpack_7z(bytes, password)?,
            other => {
                return Err(SubmissionException::UnsupportedArchive {
                    mime: other.to_owned(),
                })
            }
        };
        if members.is_empty() {
            return Err(SubmissionException::Unpack {
                reason: "the archive contains no files".to_owned(),
            });
        }
        Ok(members)
    }
}

fn unpack_zip(bytes: &[u8], password: &str) -> SubmissionResult<Vec<NamedBytes>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(unpack_error)?;
    let mut members = vec![];
    for index in 0..archive.len() {
        let mut file = archive
            .by_index_decrypt(index, password.as_bytes())
            .map_err(unpack_error)?
            .map_err(|_| SubmissionException::Unpack {
                reason: "invalid archive password".to_owned(),
            })?;
        if file.is_dir() {
            continue;
        }
        let name = base_name(file.name());
        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data).map_err(unpack_error)?;
        members.push(NamedBytes { name, bytes: data });
    }
    Ok(members)
}

fn unpack_rar(bytes: &[u8], password: &str) -> SubmissionResult<Vec<NamedBytes>> {
    // The rar reader only works on paths; scratch space is released with
    // the tempdir guard on every exit path.
    let scratch = tempfile::tempdir().map_err(unpack_error)?;
    let path = scratch.path().join("bundle.rar");
    fs::write(&path, bytes).map_err(unpack_error)?;

    let mut archive = unrar::Archive::with_password(&path, password)
        .open_for_processing()
        .map_err(unpack_error)?;
    let mut members = vec![];
    while let Some(header) = archive.read_header().map_err(unpack_error)? {
        if header.entry().is_file() {
            let name = base_name(&header.entry().filename.to_string_lossy());
            let (data, rest) = header.read().map_err(unpack_error)?;
            members.push(NamedBytes { name, bytes: data });
            archive = rest;
        } else {
            archive = header.skip().map_err(unpack_error)?;
        }
    }
    Ok(members)
}

fn unpack_7z(bytes: &[u8], password: &str) -> SubmissionResult<Vec<NamedBytes>> {
    let scratch = tempfile::tempdir().map_err(unpack_error)?;
    sevenz_rust::decompress_with_password(
        Cursor::new(bytes),
        scratch.path(),
        sevenz_rust::Password::from(password),
    )
    .map_err(unpack_error)?;
    let mut members = vec![];
    collect_files(scratch.path(), &mut members)?;
    Ok(members)
}

fn collect_files(dir: &Path, out: &mut Vec<NamedBytes>) -> SubmissionResult<()> {
    for entry in fs::read_dir(dir).map_err(unpack_error)? {
        let path = entry.map_err(unpack_error)?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let bytes = fs::read(&path).map_err(unpack_error)?;
            out.push(NamedBytes { name, bytes });
        }
    }
    Ok(())
}

fn base_name(member_path: &str) -> String {
    member_path.rsplit(['/', '\\']).next().unwrap_or(member_path).to_owned()
}

fn unpack_error(error: impl std::fmt::Display) -> SubmissionException {
    SubmissionException::Unpack {
        reason: error.to_string(),
    }
}
