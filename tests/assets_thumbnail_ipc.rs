mod test_support;

use serde_json::json;
use test_support::{open_workspace_with_admin, request_err, request_ok, spawn_sidecar, temp_dir};

// Smallest valid-enough PNG header for sniffing; the daemon validates magic
// bytes, not full image structure.
const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

#[test]
fn thumbnail_import_validates_type_and_size() {
    let workspace = temp_dir("learndesk-assets");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let token = open_workspace_with_admin(&mut stdin, &mut reader, &workspace);

    let staging = temp_dir("learndesk-assets-staging");

    let png_path = staging.join("thumb.png");
    let mut png = PNG_MAGIC.to_vec();
    png.extend_from_slice(&[0u8; 64]);
    std::fs::write(&png_path, &png).expect("write png");

    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "assets.thumbnail.import",
        json!({ "sessionToken": token, "path": png_path.to_string_lossy() }),
    );
    let url = imported["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("assets/thumbnails/"));
    assert!(url.ends_with(".png"));
    assert_eq!(imported["contentType"].as_str(), Some("image/png"));
    assert!(workspace.join(&url).is_file());

    // Re-importing identical bytes lands on the same content address.
    let again = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "assets.thumbnail.import",
        json!({ "sessionToken": token, "path": png_path.to_string_lossy() }),
    );
    assert_eq!(again["url"].as_str(), Some(url.as_str()));

    // Wrong MIME: content sniffing, not extension.
    let fake_path = staging.join("fake.png");
    std::fs::write(&fake_path, b"%PDF-1.7 not an image").expect("write fake");
    let rejected = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "assets.thumbnail.import",
        json!({ "sessionToken": token, "path": fake_path.to_string_lossy() }),
    );
    assert_eq!(rejected["code"].as_str(), Some("unsupported_media"));

    // Over the 5 MiB cap.
    let big_path = staging.join("big.gif");
    let mut big = b"GIF89a".to_vec();
    big.resize(5 * 1024 * 1024 + 1, 0);
    std::fs::write(&big_path, &big).expect("write big");
    let too_big = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "assets.thumbnail.import",
        json!({ "sessionToken": token, "path": big_path.to_string_lossy() }),
    );
    assert_eq!(too_big["code"].as_str(), Some("file_too_large"));

    // Learners cannot import assets.
    let company_id = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "companies.create",
        json!({ "sessionToken": token, "name": "Acme" }),
    )["companyId"]
        .as_str()
        .unwrap()
        .to_string();
    let learner_id = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "users.create",
        json!({
            "sessionToken": token,
            "email": "learner@acme.test",
            "displayName": "Learner",
            "role": "learner",
            "companyId": company_id
        }),
    )["userId"]
        .as_str()
        .unwrap()
        .to_string();
    let learner_token = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "auth.sessions.open",
        json!({ "userId": learner_id }),
    )["sessionToken"]
        .as_str()
        .unwrap()
        .to_string();
    let denied = request_err(
        &mut stdin,
        &mut reader,
        "8",
        "assets.thumbnail.import",
        json!({ "sessionToken": learner_token, "path": png_path.to_string_lossy() }),
    );
    assert_eq!(denied["code"].as_str(), Some("unauthorized"));
}
