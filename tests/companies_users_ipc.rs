mod test_support;

use serde_json::json;
use test_support::{open_workspace_with_admin, request_err, request_ok, spawn_sidecar, temp_dir};

#[test]
fn company_lifecycle_with_counts() {
    let workspace = temp_dir("learndesk-companies");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let token = open_workspace_with_admin(&mut stdin, &mut reader, &workspace);

    let company_id = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "companies.create",
        json!({ "sessionToken": token, "name": "Acme" }),
    )["companyId"]
        .as_str()
        .unwrap()
        .to_string();

    let learner_id = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "users.create",
        json!({
            "sessionToken": token,
            "email": "one@acme.test",
            "displayName": "One",
            "role": "learner",
            "companyId": company_id
        }),
    )["userId"]
        .as_str()
        .unwrap()
        .to_string();

    let course_id = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "courses.save",
        json!({
            "sessionToken": token,
            "companyId": company_id,
            "metadata": { "title": "Course A" },
            "modules": [{ "id": "m", "title": "M", "lessons": [
                { "id": "l", "title": "L", "content": { "blocks": [] } }
            ]}]
        }),
    )["courseId"]
        .as_str()
        .unwrap()
        .to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "enrollments.create",
        json!({ "sessionToken": token, "courseId": course_id, "userId": learner_id }),
    );

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "companies.list",
        json!({ "sessionToken": token }),
    );
    let companies = listed["companies"].as_array().unwrap();
    assert_eq!(companies.len(), 1);
    assert_eq!(companies[0]["userCount"].as_i64(), Some(1));
    assert_eq!(companies[0]["courseCount"].as_i64(), Some(1));
    assert_eq!(companies[0]["enrollmentCount"].as_i64(), Some(1));

    // Duplicate enrollment is a distinct, recoverable error.
    let dup = request_err(
        &mut stdin,
        &mut reader,
        "6",
        "enrollments.create",
        json!({ "sessionToken": token, "courseId": course_id, "userId": learner_id }),
    );
    assert_eq!(dup["code"].as_str(), Some("already_enrolled"));

    // Tenant teardown removes the company and everything under it.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "companies.delete",
        json!({ "sessionToken": token, "companyId": company_id }),
    );
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "companies.list",
        json!({ "sessionToken": token }),
    );
    assert_eq!(listed["companies"].as_array().unwrap().len(), 0);

    let gone = request_err(
        &mut stdin,
        &mut reader,
        "9",
        "courses.get",
        json!({ "sessionToken": token, "courseId": course_id }),
    );
    assert_eq!(gone["code"].as_str(), Some("not_found"));
}

#[test]
fn user_creation_validates_role_and_tenant() {
    let workspace = temp_dir("learndesk-users");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let token = open_workspace_with_admin(&mut stdin, &mut reader, &workspace);

    let bad_role = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "users.create",
        json!({
            "sessionToken": token,
            "email": "x@y.z",
            "displayName": "X",
            "role": "wizard"
        }),
    );
    assert_eq!(bad_role["code"].as_str(), Some("bad_params"));

    let no_company = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "users.create",
        json!({
            "sessionToken": token,
            "email": "x@y.z",
            "displayName": "X",
            "role": "learner"
        }),
    );
    assert_eq!(no_company["code"].as_str(), Some("bad_params"));

    let ghost_company = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "users.create",
        json!({
            "sessionToken": token,
            "email": "x@y.z",
            "displayName": "X",
            "role": "learner",
            "companyId": "missing-company"
        }),
    );
    assert_eq!(ghost_company["code"].as_str(), Some("not_found"));
}
