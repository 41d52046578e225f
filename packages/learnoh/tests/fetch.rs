mod common;

use learnoh::model::PortalTime;
use learnoh::portal::assignments::ASSIGNMENT_VIEWS;
use learnoh::portal::files::FILE_LIST_PATH;
use learnoh::portal::notices::NOTICE_VIEWS;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NOTICE_PAGE: &str = "/f/wlxt/kcgg/wlkc_ggb/student/beforeViewXs";
const ASSIGNMENT_PAGE: &str = "/f/wlxt/kczy/zy/student/viewCj";

fn course_ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

async fn mount_notice_list(server: &MockServer, course_id: &str, notice_id: &str, day: u8) {
    Mock::given(method("POST"))
        .and(path(NOTICE_VIEWS[0]))
        .and(query_param("_csrf", "tok"))
        .and(body_string_contains(common::course_form(course_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::success(json!({
            "aaData": [{
                "ggid": notice_id,
                "bt": format!("Notice {notice_id}"),
                "fbrxm": "Teacher",
                "fbsj": format!("2024-03-{day:02} 10:00"),
                "sfqd": "0",
                "sfyd": "否",
                "ggnr": "",
            }]
        }))))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(NOTICE_VIEWS[1]))
        .and(body_string_contains(common::course_form(course_id)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::success(json!({ "resultsList": [] }))),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn failing_courses_do_not_sink_the_fetch() {
    common::init_test_tracing();
    let server = MockServer::start().await;

    mount_notice_list(&server, "course1", "n1", 1).await;
    mount_notice_list(&server, "course3", "n3", 3).await;
    mount_notice_list(&server, "course5", "n5", 5).await;
    Mock::given(method("POST"))
        .and(body_string_contains(common::course_form("course2")))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains(common::course_form("course4")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "result": "error", "msg": "会话过期" })),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(NOTICE_PAGE))
        .and(query_param("id", "n1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body>
            <div id="ggnr"><p>Bring a calculator</p></div>
            <div class="fujian">
              <a href="/b/wlxt/kj/wlkc_kjxxb/student/downloadFile?sfgk=0&amp;wjid=w1">rules.pdf</a>
            </div>
            </body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(NOTICE_PAGE))
        .and(query_param("id", "n3"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(NOTICE_PAGE))
        .and(query_param("id", "n5"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
        .mount(&server)
        .await;

    let client = common::client_for(&server);
    let notices = client
        .fetch_notices(
            &course_ids(&["course1", "course2", "course3", "course4", "course5"]),
            &common::session(),
        )
        .await;

    let ids: Vec<_> = notices.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, ["n1", "n3", "n5"]);

    let n1 = &notices[0];
    assert_eq!(n1.course_id, "course1");
    assert_eq!(n1.content, "<p>Bring a calculator</p>");
    let attachment = n1.attachment.as_ref().expect("n1 should carry its attachment");
    assert_eq!(attachment.name, "rules.pdf");
    assert_eq!(
        attachment.download_url,
        format!(
            "{}/b/wlxt/kj/wlkc_kjxxb/student/downloadFile?sfgk=0&wjid=w1",
            server.uri()
        )
    );

    let n3 = &notices[1];
    assert_eq!(n3.title, "Notice n3");
    assert_eq!(n3.content, "");
    assert_eq!(n3.attachment, None);
    assert_eq!(n3.publish_time, PortalTime::Text("2024-03-03 10:00".into()));
}

#[tokio::test]
async fn assignment_views_merge_into_one_record() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    let [unsubmitted, submitted, graded] = ASSIGNMENT_VIEWS;

    let lab = json!({
        "wlkcid": "course1",
        "xszyid": "s1",
        "zyid": "z1",
        "bt": "Lab 1",
        "jzsj": 1709308740000i64,
        "zywcfs": 1,
        "zytjfs": 0,
    });
    Mock::given(method("POST"))
        .and(path(unsubmitted.path))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(common::success(json!({ "aaData": [lab.clone()] }))),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(submitted.path))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(common::success(json!({ "aaData": [lab] }))),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(graded.path))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::success(json!({
            "aaData": [{
                "wlkcid": "course1",
                "xszyid": "s2",
                "zyid": "z2",
                "bt": "Essay",
                "jzsj": "2024-02-01 23:59",
                "cj": "95",
                "jsm": "Grader",
            }]
        }))))
        .mount(&server)
        .await;

    // Both views of s1 request the same page; only one of them gets the
    // full version.
    Mock::given(method("GET"))
        .and(path(ASSIGNMENT_PAGE))
        .and(query_param("xszyid", "s1"))
        .and(query_param("zyid", "z1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<div class="list calendar clearfix"><div class="fl right"><div class="c55"><p>Implement a shell</p></div></div></div>
            <span>作业附件</span><a href="/b/wlxt/kczy/zy/student/downloadFile/z1?fileId=f1">lab1.pdf</a>"#,
        ))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(ASSIGNMENT_PAGE))
        .and(query_param("xszyid", "s1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(ASSIGNMENT_PAGE))
        .and(query_param("xszyid", "s2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = common::client_for(&server);
    let assignments = client
        .fetch_assignments(&course_ids(&["course1"]), &common::session())
        .await;

    assert_eq!(assignments.len(), 2);
    let lab = &assignments[0];
    assert_eq!(lab.id, "s1");
    assert!(lab.submitted);
    assert!(!lab.graded);
    assert_eq!(lab.description, "<p>Implement a shell</p>");
    assert_eq!(
        lab.attachment.as_ref().map(|a| a.name.as_str()),
        Some("lab1.pdf")
    );
    assert_eq!(lab.deadline, PortalTime::Millis(1_709_308_740_000));
    assert_eq!(lab.completion_type, "1");

    let essay = &assignments[1];
    assert_eq!(essay.id, "s2");
    assert!(essay.graded);
    assert_eq!(essay.grade, Some(95.0));
    assert_eq!(essay.grader_name, "Grader");
    assert_eq!(essay.attachment, None);
}

#[tokio::test]
async fn files_are_listed_per_course() {
    common::init_test_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(FILE_LIST_PATH))
        .and(query_param("_csrf", "tok"))
        .and(query_param("wlkcid", "course1"))
        .and(query_param("size", "200"))
        .and(header("cookie", "JSESSIONID=abc; XSRF-TOKEN=tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::success(json!([
            {
                "kjxxid": "k1",
                "wjid": "w1",
                "bt": "Slides",
                "ms": "week 1",
                "fileSize": 1024,
                "scsj": 1709222400000i64,
                "wjlx": "pptx",
                "isNew": false,
            }
        ]))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(FILE_LIST_PATH))
        .and(query_param("wlkcid", "course2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let client = common::client_for(&server);
    let files = client
        .fetch_files(&course_ids(&["course1", "course2"]), &common::session())
        .await;

    assert_eq!(files.len(), 1);
    let file = &files[0];
    assert_eq!(file.id, "k1");
    assert_eq!(file.title, "Slides");
    assert_eq!(file.size, 1024);
    assert_eq!(file.upload_time, PortalTime::Millis(1_709_222_400_000));
    assert_eq!(
        file.download_url,
        format!(
            "{}/b/wlxt/kj/wlkc_kjxxb/student/downloadFile?sfgk=0&wjid=w1",
            server.uri()
        )
    );
}

#[tokio::test]
async fn bridge_returns_json_text() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FILE_LIST_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::success(json!([
            { "kjxxid": "k1", "wjid": "w1", "bt": "A", "fileSize": 1, "scsj": "2024-01-01" },
            { "kjxxid": "k2", "wjid": "w2", "bt": "B", "fileSize": 2, "scsj": "2024-02-01" },
        ]))))
        .mount(&server)
        .await;

    let config = learnoh::PortalConfig::default()
        .with_base_url(url::Url::parse(&server.uri()).unwrap())
        .with_max_concurrency(Some(1));
    let processor = learnoh::DataProcessor::new(config).unwrap();
    let raw = processor
        .fetch_files(&course_ids(&["course1"]), "JSESSIONID=abc", "tok")
        .await
        .unwrap();
    let out = processor
        .process_files(&raw, r#"{ "course1": { "name": "编译原理", "teacherName": "李老师" } }"#)
        .await
        .unwrap();

    let out: Vec<serde_json::Value> = serde_json::from_str(&out).unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out[0]["id"], "k2");
    assert_eq!(out[0]["courseName"], "编译原理");
    assert_eq!(out[1]["courseTeacherName"], "李老师");
}
