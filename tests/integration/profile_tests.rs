use mediadedupe::catalog::{Location, MediaRecord};
use mediadedupe::duplicates::{CandidateGroup, Profile, ProfileMatcher};

fn groups(profile: Profile, records: Vec<MediaRecord>) -> Vec<CandidateGroup> {
    ProfileMatcher::new(profile).candidate_groups(records).0.collect()
}

fn song(path: &str, duration: f64) -> MediaRecord {
    MediaRecord::new(path, 3000)
        .with_music("Title", "Artist", "Album")
        .with_duration(duration)
}

#[test]
fn test_music_within_tolerance_grouped() {
    let found = groups(
        Profile::MusicIdentity,
        vec![song("/a.mp3", 100.0), song("/b.mp3", 104.0)],
    );
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].paths(), vec!["/a.mp3", "/b.mp3"]);
}

#[test]
fn test_music_outside_tolerance_not_grouped() {
    let found = groups(
        Profile::MusicIdentity,
        vec![song("/a.mp3", 100.0), song("/b.mp3", 109.0)],
    );
    assert!(found.is_empty());
}

#[test]
fn test_music_exact_tolerance_edge() {
    let found = groups(
        Profile::MusicIdentity,
        vec![song("/a.mp3", 100.0), song("/b.mp3", 108.0)],
    );
    assert_eq!(found.len(), 1);
}

#[test]
fn test_music_requires_all_three_fields() {
    let other_album = MediaRecord::new("/b.mp3", 3000)
        .with_music("Title", "Artist", "Live")
        .with_duration(100.0);
    let no_album = MediaRecord::new("/c.mp3", 3000)
        .with_music("Title", "Artist", "")
        .with_duration(100.0);

    let (found, stats) = ProfileMatcher::new(Profile::MusicIdentity)
        .candidate_groups(vec![song("/a.mp3", 100.0), other_album, no_album]);
    assert_eq!(found.count(), 0);
    assert_eq!(stats.total_records, 3);
    assert_eq!(stats.excluded_records, 1);
}

#[test]
fn test_chain_produces_overlapping_windows() {
    let titled = |p: &str, d: f64| MediaRecord::new(p, 1).with_title("T").with_duration(d);
    let found = groups(
        Profile::Title,
        vec![titled("/a", 100.0), titled("/b", 106.0), titled("/c", 112.0)],
    );

    let windows: Vec<Vec<&str>> = found.iter().map(CandidateGroup::paths).collect();
    assert_eq!(
        windows,
        vec![vec!["/a", "/b"], vec!["/a", "/b", "/c"], vec!["/b", "/c"]]
    );
}

#[test]
fn test_identical_windows_collapse() {
    let titled = |p: &str| MediaRecord::new(p, 1).with_title("T").with_duration(50.0);
    let found = groups(Profile::Title, vec![titled("/a"), titled("/b"), titled("/c")]);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].len(), 3);
}

#[test]
fn test_extractor_id_ignores_titles() {
    let clip = |p: &str, title: &str| {
        MediaRecord::new(p, 1)
            .with_extractor_id("youtube:xyz")
            .with_title(title)
            .with_duration(10.0)
    };
    let found = groups(
        Profile::ExtractorId,
        vec![clip("/a.webm", "Original"), clip("/b.mp4", "Reupload")],
    );
    assert_eq!(found.len(), 1);
}

#[test]
fn test_duration_is_exact() {
    let found = groups(
        Profile::Duration,
        vec![
            MediaRecord::new("/a", 1).with_duration(60.0),
            MediaRecord::new("/b", 1).with_duration(60.0),
            MediaRecord::new("/c", 1).with_duration(60.5),
            MediaRecord::new("/d", 1),
        ],
    );
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].paths(), vec!["/a", "/b"]);
}

#[test]
fn test_filesystem_groups_by_size_only() {
    let found = groups(
        Profile::FilesystemContent,
        vec![
            MediaRecord::new("/a", 100),
            MediaRecord::new("/b", 100),
            MediaRecord::new("/c", 200),
            MediaRecord::new("/empty1", 0),
            MediaRecord::new("/empty2", 0),
        ],
    );
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].paths(), vec!["/a", "/b"]);
}

#[test]
fn test_filesystem_skips_remote_and_directories() {
    let remote = MediaRecord::new("https://example.com/a", 100);
    assert_eq!(remote.location, Location::Remote);

    let found = groups(
        Profile::FilesystemContent,
        vec![
            MediaRecord::new("/a", 100),
            remote,
            MediaRecord::new("/dir/", 100),
        ],
    );
    assert!(found.is_empty());
}

#[test]
fn test_groups_preserve_catalog_order() {
    let found = groups(
        Profile::FilesystemContent,
        vec![
            MediaRecord::new("/z", 5),
            MediaRecord::new("/y", 7),
            MediaRecord::new("/a", 5),
            MediaRecord::new("/b", 7),
        ],
    );
    let paths: Vec<Vec<&str>> = found.iter().map(CandidateGroup::paths).collect();
    assert_eq!(paths, vec![vec!["/z", "/a"], vec!["/y", "/b"]]);
}
