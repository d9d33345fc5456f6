mod common;

use common::id3_builder::TagBuilder;
use mir_proto::id3;
use mir_proto::session::Session;

fn session() -> Session {
    Session::new("Radio MIR", "Live broadcast", 5)
}

#[test]
fn title_and_artist_frames_reach_the_display() {
    let tag = TagBuilder::new()
        .text("TIT2", "Song Y")
        .text("TPE1", "Artist X")
        .build(16);

    let frames = id3::decode(&tag);
    assert_eq!(frames.len(), 2);

    let mut s = session();
    let updates = s.apply_frames(&frames);
    let last = updates.last().expect("at least one display update");
    assert_eq!(last.title, "Song Y");
    assert_eq!(last.artist, "Artist X");
    assert_eq!(last.status, "On air: Song Y");
}

#[test]
fn repeated_container_is_a_noop() {
    let tag = TagBuilder::new()
        .text("TIT2", "Song Y")
        .text("TPE1", "Artist X")
        .build(16);

    let mut s = session();
    let first = s.apply_frames(&id3::decode(&tag));
    let second = s.apply_frames(&id3::decode(&tag));
    assert!(!first.is_empty());
    assert!(second.is_empty());
}

#[test]
fn comment_frame_fills_both_fields() {
    let tag = TagBuilder::new()
        .text("COMM", "Artist X - Song Y")
        .build(16);

    let mut s = session();
    let updates = s.apply_frames(&id3::decode(&tag));
    assert_eq!(updates.len(), 1);
    assert_eq!(s.now_playing().artist.as_deref(), Some("Artist X"));
    assert_eq!(s.now_playing().title.as_deref(), Some("Song Y"));
}

#[test]
fn unknown_frame_with_delimiter_uses_length_heuristic() {
    let tag = TagBuilder::new()
        .text("TXXX", "Some Longer Title - A")
        .build(16);

    let mut s = session();
    s.apply_frames(&id3::decode(&tag));
    assert_eq!(s.now_playing().artist.as_deref(), Some("A"));
    assert_eq!(s.now_playing().title.as_deref(), Some("Some Longer Title"));
}

#[test]
fn binary_frames_do_not_disturb_text_frames() {
    let tag = TagBuilder::new()
        .raw("PRIV", b"com.apple.streaming.transportStreamTimestamp\x00\x00\x00\x00\x01\x02\x03\x04\x05")
        .text("TIT2", "Song Y")
        .build(16);

    let frames = id3::decode(&tag);
    assert_eq!(frames.last().map(|f| f.id.as_str()), Some("TIT2"));

    let mut s = session();
    s.apply_frames(&frames);
    assert_eq!(s.now_playing().title.as_deref(), Some("Song Y"));
}

#[test]
fn truncated_container_keeps_leading_frames() {
    let mut tag = TagBuilder::new()
        .text("TIT2", "Song Y")
        .text("TPE1", "Artist X")
        .build(0);
    tag.truncate(tag.len() - 3);

    let frames = id3::decode(&tag);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].text, "Song Y");
}

#[test]
fn history_rolls_over_after_six_tracks() {
    let mut s = session();
    for i in 1..=6 {
        let tag = TagBuilder::new()
            .text("TIT2", &format!("Song {}", i))
            .text("TPE1", "Band")
            .build(16);
        s.apply_frames(&id3::decode(&tag));
    }
    let titles: Vec<_> = s.history().entries().map(|e| e.title.as_str()).collect();
    assert_eq!(titles.len(), 5);
    assert_eq!(titles[0], "Song 6");
    assert!(titles.iter().all(|t| !t.starts_with("Song 1")));
}

#[test]
fn tag_len_covers_built_container() {
    let tag = TagBuilder::new().text("TIT2", "Song").build(8);
    assert_eq!(id3::tag_len(&tag), Some(tag.len()));
}
