mod test_support;

use serde_json::json;
use test_support::{open_workspace_with_admin, request_ok, spawn_sidecar, temp_dir};

fn save_titled(
    stdin: &mut std::process::ChildStdin,
    reader: &mut std::io::BufReader<std::process::ChildStdout>,
    id: &str,
    token: &str,
    title: &str,
) -> String {
    let saved = request_ok(
        stdin,
        reader,
        id,
        "courses.save",
        json!({
            "sessionToken": token,
            "metadata": { "title": title },
            "modules": [
                { "id": format!("m-{}", id), "title": "Module 1", "lessons": [
                    { "id": format!("l-{}", id), "title": "Lesson 1", "content": { "blocks": [] } }
                ] }
            ]
        }),
    );
    saved["course"]["slug"].as_str().unwrap().to_string()
}

#[test]
fn same_title_probes_numeric_suffixes() {
    let workspace = temp_dir("learndesk-slugs");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let token = open_workspace_with_admin(&mut stdin, &mut reader, &workspace);

    assert_eq!(save_titled(&mut stdin, &mut reader, "1", &token, "Acme"), "acme");
    assert_eq!(save_titled(&mut stdin, &mut reader, "2", &token, "Acme"), "acme-2");
    assert_eq!(save_titled(&mut stdin, &mut reader, "3", &token, "Acme"), "acme-3");
    // Slugs are derived URL-safe regardless of title punctuation.
    assert_eq!(
        save_titled(&mut stdin, &mut reader, "4", &token, "Acme: The Sequel!"),
        "acme-the-sequel"
    );
}
