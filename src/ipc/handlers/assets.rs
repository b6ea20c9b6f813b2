use serde_json::json;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

use super::auth;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, required_str};
use crate::ipc::types::{AppState, Request};

const MAX_THUMBNAIL_BYTES: usize = 5 * 1024 * 1024;

/// Sniffed from magic bytes, never from the file extension.
fn image_extension(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("jpg");
    }
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("png");
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some("gif");
    }
    if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        return Some("webp");
    }
    None
}

/// Copies a local image into the workspace's asset store under a
/// content-addressed name and returns the URL to use as `thumbnail_url`.
fn handle_thumbnail_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    if let Err(e) = auth::require_admin(conn, req) {
        return e;
    }
    let source = match required_str(req, "path") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    let Some(workspace) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let bytes = match std::fs::read(&source) {
        Ok(b) => b,
        Err(e) => {
            return err(
                &req.id,
                "io_failed",
                format!("could not read {}: {}", source.display(), e),
                None,
            )
        }
    };

    if bytes.len() > MAX_THUMBNAIL_BYTES {
        return err(
            &req.id,
            "file_too_large",
            format!(
                "thumbnail is {} bytes (max {})",
                bytes.len(),
                MAX_THUMBNAIL_BYTES
            ),
            None,
        );
    }
    let Some(ext) = image_extension(&bytes) else {
        return err(
            &req.id,
            "unsupported_media",
            "thumbnail must be JPEG, PNG, WebP or GIF",
            None,
        );
    };

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let digest = hasher.finalize();
    let short: String = digest
        .iter()
        .take(16)
        .map(|b| format!("{:02x}", b))
        .collect();

    let dir = workspace.join("assets").join("thumbnails");
    if let Err(e) = std::fs::create_dir_all(&dir) {
        return err(&req.id, "io_failed", e.to_string(), None);
    }
    let filename = format!("{}.{}", short, ext);
    let target = dir.join(&filename);
    // Content-addressed: re-importing the same bytes is a no-op.
    if !target.exists() {
        if let Err(e) = std::fs::write(&target, &bytes) {
            return err(&req.id, "io_failed", e.to_string(), None);
        }
    }

    ok(
        &req.id,
        json!({
            "url": format!("assets/thumbnails/{}", filename),
            "bytes": bytes.len(),
            "contentType": match ext {
                "jpg" => "image/jpeg",
                "png" => "image/png",
                "gif" => "image/gif",
                _ => "image/webp",
            },
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assets.thumbnail.import" => Some(handle_thumbnail_import(state, req)),
        _ => None,
    }
}
