use std::ffi::OsString;
use std::path::PathBuf;
use std::rc::Rc;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::db::{Database, ListenEntry};
use crate::http::test_server::{Reply, TestServer};

use super::episode::*;
use super::history::{ListenRecorder, finish_listening};
use super::player::{PlayerState, PlayerStore};
use super::tui::PlayerControl;
use super::{history_row, resolve_api_url, resolve_player_bin};

const FEED: &str = r#"[
  {
    "id": "a-importancia-da-contribuicao-em-open-source",
    "title": "A importância da contribuição em Open Source",
    "members": "Diego e Richard",
    "published_at": "2021-01-08 16:30:00",
    "thumbnail": "https://cdn.test/opensource.jpg",
    "description": "<p>Nesse episódio...</p>",
    "file": {
      "url": "https://cdn.test/opensource.m4a",
      "type": "audio/x-m4a",
      "duration": 3981
    }
  },
  {
    "id": 7,
    "title": "Faz sentido aprender inglês?",
    "members": "Tiago",
    "published_at": "2021-01-06T10:00:00Z",
    "file": { "url": "https://cdn.test/ingles.m4a", "duration": "1812" }
  },
  { "id": "broken", "title": "No file here" },
  {
    "id": "sem-duracao",
    "title": "Sem duração",
    "members": "Diego",
    "published_at": "2021-01-01 08:00:00",
    "file": { "url": "https://cdn.test/sem.m4a" }
  }
]"#;

fn sample_episode(name: &str, duration_seconds: u64) -> Episode {
    Episode {
        title: format!("Episode {name}"),
        members: "Diego".to_string(),
        thumbnail_url: String::new(),
        duration_seconds,
        media_url: format!("https://cdn.test/{name}.mp3"),
    }
}

#[test]
fn format_duration_pads_every_unit() {
    assert_eq!(format_duration(0), "00:00:00");
    assert_eq!(format_duration(61), "00:01:01");
    assert_eq!(format_duration(3661), "01:01:01");
    assert_eq!(format_duration(3981), "01:06:21");
}

#[test]
fn format_duration_lets_hours_grow_past_a_day() {
    assert_eq!(format_duration(90000), "25:00:00");
}

#[test]
fn parse_episodes_maps_api_fields() {
    let outcome = parse_episodes(FEED).expect("feed should parse");
    let first = &outcome.episodes[0];

    assert_eq!(first.id, "a-importancia-da-contribuicao-em-open-source");
    assert_eq!(first.published_at, "2021-01-08 16:30:00");
    assert_eq!(first.description, "<p>Nesse episódio...</p>");
    assert_eq!(
        first.episode,
        Episode {
            title: "A importância da contribuição em Open Source".to_string(),
            members: "Diego e Richard".to_string(),
            thumbnail_url: "https://cdn.test/opensource.jpg".to_string(),
            duration_seconds: 3981,
            media_url: "https://cdn.test/opensource.m4a".to_string(),
        }
    );
}

#[test]
fn parse_episodes_skips_records_without_media_and_keeps_order() {
    let outcome = parse_episodes(FEED).expect("feed should parse");

    let ids: Vec<&str> = outcome.episodes.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["a-importancia-da-contribuicao-em-open-source", "7", "sem-duracao"]
    );
    assert_eq!(
        outcome.warnings,
        vec!["skipped malformed episode record #3".to_string()]
    );
}

#[test]
fn parse_episodes_accepts_text_durations_and_defaults_missing_ones() {
    let outcome = parse_episodes(FEED).expect("feed should parse");

    assert_eq!(outcome.episodes[1].episode.duration_seconds, 1812);
    assert_eq!(outcome.episodes[1].episode.thumbnail_url, "");
    assert_eq!(outcome.episodes[2].episode.duration_seconds, 0);
}

#[test]
fn parse_episodes_rejects_non_array_payloads() {
    let err = parse_episodes(r#"{"episodes":[]}"#).expect_err("object should be rejected");
    assert!(format!("{err:#}").contains("not a JSON array"));

    assert!(parse_episodes("<html>").is_err());
    assert!(
        parse_episodes("[]")
            .expect("empty list is fine")
            .episodes
            .is_empty()
    );
}

#[test]
fn parse_episodes_keeps_records_without_an_id() {
    let outcome = parse_episodes(
        r#"[{"title":"Sem id","members":"Diego","file":{"url":"https://cdn.test/x.m4a","duration":60}}]"#,
    )
    .expect("feed should parse");

    assert!(outcome.warnings.is_empty());
    assert_eq!(outcome.episodes.len(), 1);
    assert_eq!(outcome.episodes[0].id, "");
    assert_eq!(outcome.episodes[0].episode.title, "Sem id");
}

#[test]
fn playable_queue_follows_list_order() {
    let outcome = parse_episodes(FEED).expect("feed should parse");
    let queue = playable_queue(&outcome.episodes);

    assert_eq!(queue.len(), 3);
    assert_eq!(queue[1].media_url, "https://cdn.test/ingles.m4a");
}

#[test]
fn format_published_date_accepts_both_timestamp_styles() {
    assert_eq!(format_published_date("2021-01-08 16:30:00"), "8 Jan 21");
    assert_eq!(format_published_date("2021-01-06T10:00:00Z"), "6 Jan 21");
    assert_eq!(format_published_date(" yesterday "), "yesterday");
}

#[test]
fn truncate_marks_cut_text() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("abcdefghij", 7), "abcd...");
    assert_eq!(truncate("inglês avançado", 9), "inglês...");
}

#[test]
fn plain_text_strips_markup_and_collapses_whitespace() {
    assert_eq!(
        plain_text("<p>Nesse episódio do <strong>Faladev</strong>,</p>\n<p>vamos   falar</p>"),
        "Nesse episódio do Faladev , vamos falar"
    );
    assert_eq!(plain_text(""), "");
}

#[test]
fn api_url_prefers_flag_then_env_then_default() {
    assert_eq!(
        resolve_api_url(Some("http://flag:1/"), Some(OsString::from("http://env:2"))),
        "http://flag:1"
    );
    assert_eq!(
        resolve_api_url(None, Some(OsString::from("http://env:2//"))),
        "http://env:2"
    );
    assert_eq!(resolve_api_url(Some("  "), None), "http://localhost:3333");
    assert_eq!(
        resolve_api_url(None, Some(OsString::new())),
        "http://localhost:3333"
    );
}

#[test]
fn player_bin_prefers_flag_then_env_then_mpv() {
    assert_eq!(
        resolve_player_bin(Some("/opt/mpv"), Some(OsString::from("/usr/bin/mpv"))),
        PathBuf::from("/opt/mpv")
    );
    assert_eq!(
        resolve_player_bin(None, Some(OsString::from("/usr/bin/mpv"))),
        PathBuf::from("/usr/bin/mpv")
    );
    assert_eq!(resolve_player_bin(None, None), PathBuf::from("mpv"));
}

#[test]
fn controls_are_disabled_without_an_episode() {
    let state = PlayerState::default();
    for control in PlayerControl::ALL {
        assert!(!control.is_enabled(&state), "{control:?} should be disabled");
    }
}

#[test]
fn controls_follow_queue_position() {
    let mut store = PlayerStore::with_rng(StdRng::seed_from_u64(1));
    store.play_single(sample_episode("solo", 60));
    assert!(!PlayerControl::Shuffle.is_enabled(store.state()));
    assert!(!PlayerControl::Previous.is_enabled(store.state()));
    assert!(!PlayerControl::Next.is_enabled(store.state()));
    assert!(PlayerControl::PlayPause.is_enabled(store.state()));
    assert!(PlayerControl::Loop.is_enabled(store.state()));

    store.play_queue(
        vec![
            sample_episode("a", 10),
            sample_episode("b", 10),
            sample_episode("c", 10),
        ],
        1,
    );
    for control in PlayerControl::ALL {
        assert!(control.is_enabled(store.state()), "{control:?} should be enabled");
    }
    assert_eq!(PlayerControl::PlayPause.label(store.state()), "PAUSE");

    store.toggle_play();
    assert_eq!(PlayerControl::PlayPause.label(store.state()), "PLAY");
    assert!(!PlayerControl::PlayPause.is_active(store.state()));
}

#[test]
fn listen_recorder_saves_new_episodes_and_throttles_progress() {
    let db = Rc::new(Database::open_in_memory().expect("open db"));
    db.migrate().expect("migrate");
    let mut store = PlayerStore::with_rng(StdRng::seed_from_u64(3));
    ListenRecorder::new(Rc::clone(&db)).attach(&mut store);

    store.play_queue(vec![sample_episode("a", 600), sample_episode("b", 900)], 0);
    store.set_progress(4);
    let history = db.list_history().expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].media_url, "https://cdn.test/a.mp3");
    assert_eq!(history[0].duration_seconds, 600);
    assert_eq!(history[0].progress_seconds, 0);

    store.set_progress(12);
    store.set_progress(15);
    let history = db.list_history().expect("history");
    assert_eq!(history[0].progress_seconds, 12);

    store.play_next();
    let history = db.list_history().expect("history");
    assert_eq!(history.len(), 2);
    assert!(
        history
            .iter()
            .any(|entry| entry.media_url == "https://cdn.test/b.mp3" && entry.progress_seconds == 0)
    );
}

#[test]
fn fetch_episodes_requests_newest_first_with_limit() {
    let server = TestServer::spawn(vec![Reply::Status(200, FEED.to_string())]);

    let outcome = fetch_episodes(&format!("{}/", server.base_url), 12).expect("fetch");

    assert_eq!(outcome.episodes.len(), 3);
    let request = server.last_request_line();
    assert!(request.starts_with("GET /episodes?"), "request: {request}");
    assert!(request.contains("_limit=12"), "request: {request}");
    assert!(request.contains("_sort=published_at"), "request: {request}");
    assert!(request.contains("_order=desc"), "request: {request}");
}

#[test]
fn fetch_episodes_reports_server_failures() {
    let server = TestServer::spawn(vec![Reply::Status(404, "missing".to_string())]);

    let err = fetch_episodes(&server.base_url, 5).expect_err("404 should fail");

    let message = format!("{err:#}");
    assert!(message.contains("failed to fetch episodes"), "{message}");
    assert!(message.contains("404"), "{message}");
    assert_eq!(server.hits(), 1);
}

#[test]
fn finish_listening_stores_exact_position_and_detaches() {
    let db = Rc::new(Database::open_in_memory().expect("open db"));
    db.migrate().expect("migrate");
    let mut store = PlayerStore::with_rng(StdRng::seed_from_u64(5));
    let recorder = ListenRecorder::new(Rc::clone(&db)).attach(&mut store);

    store.play_single(sample_episode("a", 600));
    store.set_progress(7);
    finish_listening(&db, &mut store, recorder);
    assert_eq!(db.list_history().expect("history")[0].progress_seconds, 7);

    store.play_single(sample_episode("b", 600));
    assert_eq!(db.list_history().expect("history").len(), 1);
}

#[test]
fn listen_recorder_flushes_the_episode_being_left() {
    let db = Rc::new(Database::open_in_memory().expect("open db"));
    db.migrate().expect("migrate");
    let mut store = PlayerStore::with_rng(StdRng::seed_from_u64(9));
    ListenRecorder::new(Rc::clone(&db)).attach(&mut store);

    store.play_queue(vec![sample_episode("a", 600), sample_episode("b", 900)], 0);
    store.set_progress(4);
    store.play_next();
    store.set_progress(23);
    store.set_progress(27);
    store.clear();

    let history = db.list_history().expect("history");
    let progress_of = |url: &str| {
        history
            .iter()
            .find(|entry| entry.media_url == url)
            .map(|entry| entry.progress_seconds)
    };
    assert_eq!(progress_of("https://cdn.test/a.mp3"), Some(4));
    assert_eq!(progress_of("https://cdn.test/b.mp3"), Some(27));
}

#[test]
fn history_rows_show_the_media_url() {
    let row = history_row(&ListenEntry {
        media_url: "https://cdn.test/a.mp3".to_string(),
        title: "Episode a".to_string(),
        members: "Diego".to_string(),
        progress_seconds: 61,
        duration_seconds: 3661,
        last_played_at: "not a timestamp".to_string(),
    });

    assert!(row.starts_with("Episode a"), "{row}");
    assert!(row.contains("00:01:01 / 01:01:01"), "{row}");
    assert!(row.contains("not a timestamp"), "{row}");
    assert!(row.ends_with("https://cdn.test/a.mp3"), "{row}");
}
