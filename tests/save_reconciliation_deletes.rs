mod test_support;

use serde_json::json;
use test_support::{open_workspace_with_admin, request_ok, spawn_sidecar, temp_dir};

fn lesson(id: &str, title: &str) -> serde_json::Value {
    json!({
        "id": id,
        "title": title,
        "content": { "blocks": [] }
    })
}

#[test]
fn payload_is_the_complete_desired_state() {
    let workspace = temp_dir("learndesk-reconcile");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let token = open_workspace_with_admin(&mut stdin, &mut reader, &workspace);

    // Persist modules [A, B] with lessons [A1, A2, B1].
    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "courses.save",
        json!({
            "sessionToken": token,
            "metadata": { "title": "Reconciliation" },
            "modules": [
                {
                    "id": "mod-a", "title": "Module A", "sortOrder": 0,
                    "lessons": [lesson("les-a1", "A1"), lesson("les-a2", "A2")]
                },
                {
                    "id": "mod-b", "title": "Module B", "sortOrder": 1,
                    "lessons": [lesson("les-b1", "B1")]
                }
            ]
        }),
    );
    let course_id = saved["courseId"].as_str().unwrap().to_string();

    // Save again with only A/A1; B, B1 and A2 must be deleted, A and A1
    // updated in place under the same ids.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "courses.save",
        json!({
            "sessionToken": token,
            "courseId": course_id,
            "metadata": { "title": "Reconciliation" },
            "modules": [
                {
                    "id": "mod-a", "title": "Module A Renamed", "sortOrder": 0,
                    "lessons": [lesson("les-a1", "A1 Renamed")]
                }
            ]
        }),
    );

    let fetched = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "courses.get",
        json!({ "sessionToken": token, "courseId": course_id }),
    );
    let modules = fetched["modules"].as_array().unwrap();
    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0]["id"].as_str(), Some("mod-a"));
    assert_eq!(modules[0]["title"].as_str(), Some("Module A Renamed"));

    let lessons = modules[0]["lessons"].as_array().unwrap();
    assert_eq!(lessons.len(), 1);
    assert_eq!(lessons[0]["id"].as_str(), Some("les-a1"));
    assert_eq!(lessons[0]["title"].as_str(), Some("A1 Renamed"));
}

#[test]
fn moving_a_lesson_between_modules_keeps_its_id() {
    let workspace = temp_dir("learndesk-reconcile-move");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let token = open_workspace_with_admin(&mut stdin, &mut reader, &workspace);

    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "courses.save",
        json!({
            "sessionToken": token,
            "metadata": { "title": "Mover" },
            "modules": [
                { "id": "m1", "title": "One", "lessons": [lesson("l1", "Moving Lesson")] },
                { "id": "m2", "title": "Two", "lessons": [lesson("l2", "Fixed Lesson")] }
            ]
        }),
    );
    let course_id = saved["courseId"].as_str().unwrap().to_string();

    // The upsert carries module_id, so re-parenting is just a payload move.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "courses.save",
        json!({
            "sessionToken": token,
            "courseId": course_id,
            "metadata": { "title": "Mover" },
            "modules": [
                { "id": "m1", "title": "One", "lessons": [] },
                { "id": "m2", "title": "Two",
                  "lessons": [lesson("l2", "Fixed Lesson"), lesson("l1", "Moving Lesson")] }
            ]
        }),
    );

    let fetched = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "courses.get",
        json!({ "sessionToken": token, "courseId": course_id }),
    );
    let modules = fetched["modules"].as_array().unwrap();
    assert_eq!(modules[0]["lessons"].as_array().unwrap().len(), 0);
    let m2_lessons = modules[1]["lessons"].as_array().unwrap();
    assert_eq!(m2_lessons.len(), 2);
    assert_eq!(m2_lessons[1]["id"].as_str(), Some("l1"));
}
