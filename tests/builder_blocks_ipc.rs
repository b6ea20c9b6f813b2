mod test_support;

use serde_json::json;
use test_support::{open_workspace_with_admin, request_err, request_ok, spawn_sidecar, temp_dir};

fn block_orders(state: &serde_json::Value, lesson_id: &str) -> Vec<(String, i64)> {
    state["modules"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|m| m["lessons"].as_array().unwrap().iter())
        .find(|l| l["id"].as_str() == Some(lesson_id))
        .expect("selected lesson present")["blocks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| {
            (
                b["id"].as_str().unwrap().to_string(),
                b["order"].as_i64().unwrap(),
            )
        })
        .collect()
}

#[test]
fn block_mutations_keep_order_contiguous() {
    let workspace = temp_dir("learndesk-builder-blocks");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let token = open_workspace_with_admin(&mut stdin, &mut reader, &workspace);

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "builder.open",
        json!({ "sessionToken": token }),
    );
    let lesson_id = opened["selectedLessonId"].as_str().expect("selection").to_string();

    let b0 = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "builder.blocks.add",
        json!({ "sessionToken": token, "type": "text", "data": { "text": "hello" } }),
    )["block"]["id"]
        .as_str()
        .unwrap()
        .to_string();
    let _b1 = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "builder.blocks.add",
        json!({ "sessionToken": token, "type": "heading" }),
    );
    let b2 = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "builder.blocks.add",
        json!({ "sessionToken": token, "type": "table" }),
    )["block"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let dup = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "builder.blocks.duplicate",
        json!({ "sessionToken": token, "blockId": b0 }),
    );
    assert_eq!(dup["block"]["order"].as_i64(), Some(3));
    assert_ne!(dup["block"]["id"].as_str(), Some(b0.as_str()));
    assert_eq!(dup["block"]["data"]["text"].as_str(), Some("hello"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "builder.blocks.delete",
        json!({ "sessionToken": token, "blockId": b2 }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "builder.blocks.reorder",
        json!({ "sessionToken": token, "lessonId": lesson_id, "fromIndex": 2, "toIndex": 0 }),
    );

    let state = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "builder.state",
        json!({ "sessionToken": token }),
    );
    let orders: Vec<i64> = block_orders(&state, &lesson_id).iter().map(|(_, o)| *o).collect();
    assert_eq!(orders, vec![0, 1, 2]);
}

#[test]
fn update_merges_partial_data_shallowly() {
    let workspace = temp_dir("learndesk-builder-update");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let token = open_workspace_with_admin(&mut stdin, &mut reader, &workspace);

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "builder.open",
        json!({ "sessionToken": token }),
    );
    let lesson_id = opened["selectedLessonId"].as_str().unwrap().to_string();

    let block_id = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "builder.blocks.add",
        json!({ "sessionToken": token, "type": "video" }),
    )["block"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "builder.blocks.update",
        json!({
            "sessionToken": token,
            "blockId": block_id,
            "patch": { "url": "https://video.example/intro" }
        }),
    );

    let state = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "builder.state",
        json!({ "sessionToken": token }),
    );
    let blocks = block_orders(&state, &lesson_id);
    assert_eq!(blocks.len(), 1);
    let block = state["modules"][0]["lessons"][0]["blocks"][0].clone();
    assert_eq!(block["data"]["url"].as_str(), Some("https://video.example/intro"));
    // defaults created at add time survive the merge
    assert_eq!(block["data"]["title"].as_str(), Some(""));
}

#[test]
fn add_block_needs_a_selected_lesson_and_known_type() {
    let workspace = temp_dir("learndesk-builder-errors");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let token = open_workspace_with_admin(&mut stdin, &mut reader, &workspace);

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "builder.open",
        json!({ "sessionToken": token }),
    );
    let lesson_id = opened["selectedLessonId"].as_str().unwrap().to_string();

    let error = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "builder.blocks.add",
        json!({ "sessionToken": token, "type": "hologram" }),
    );
    assert_eq!(error["code"].as_str(), Some("bad_params"));

    // Deleting the only lesson clears the selection.
    let deleted = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "builder.lessons.delete",
        json!({ "sessionToken": token, "lessonId": lesson_id }),
    );
    assert!(deleted["selectedLessonId"].is_null());

    let error = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "builder.blocks.add",
        json!({ "sessionToken": token, "type": "text" }),
    );
    assert_eq!(error["code"].as_str(), Some("no_lesson_selected"));
    assert!(error["message"].as_str().unwrap().contains("select or create"));
}

#[test]
fn module_and_lesson_titles_auto_number() {
    let workspace = temp_dir("learndesk-builder-titles");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let token = open_workspace_with_admin(&mut stdin, &mut reader, &workspace);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "builder.open",
        json!({ "sessionToken": token }),
    );
    let added = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "builder.modules.add",
        json!({ "sessionToken": token }),
    );
    assert_eq!(added["title"].as_str(), Some("Module 2"));

    let module_id = added["moduleId"].as_str().unwrap().to_string();
    let lesson = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "builder.lessons.add",
        json!({ "sessionToken": token, "moduleId": module_id }),
    );
    assert_eq!(lesson["title"].as_str(), Some("Lesson 1"));

    // Renaming an unknown id is a silent no-op.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "builder.modules.rename",
        json!({ "sessionToken": token, "moduleId": "missing", "title": "X" }),
    );
    let state = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "builder.state",
        json!({ "sessionToken": token }),
    );
    assert_eq!(state["modules"][0]["title"].as_str(), Some("Module 1"));
}
