use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mediadedupe::catalog::MediaRecord;
use mediadedupe::duplicates::{ClaimSet, KeepSelector, Profile, ProfileMatcher};

fn music_records(n: usize) -> Vec<MediaRecord> {
    (0..n)
        .map(|i| {
            let song = i % (n / 4).max(1);
            MediaRecord::new(format!("/music/{}/{}/track-{i}.flac", i % 7, i % 13), 4_000_000)
                .with_music(&format!("Song {song}"), "Artist", "Album")
                .with_duration(180.0 + (i % 5) as f64 * 3.0)
                .with_streams(1, 0, 0)
        })
        .collect()
}

fn sized_records(n: usize) -> Vec<MediaRecord> {
    (0..n)
        .map(|i| MediaRecord::new(format!("/data/{}/file-{i}.bin", i % 11), (i % 500) as i64 + 1))
        .collect()
}

fn bench_grouping(c: &mut Criterion) {
    let music = music_records(10_000);
    c.bench_function("music_identity_10k", |b| {
        b.iter(|| {
            let (groups, _) =
                ProfileMatcher::new(Profile::MusicIdentity).candidate_groups(music.clone());
            black_box(groups.count());
        })
    });

    let sized = sized_records(10_000);
    c.bench_function("filesystem_size_10k", |b| {
        b.iter(|| {
            let (groups, _) =
                ProfileMatcher::new(Profile::FilesystemContent).candidate_groups(sized.clone());
            black_box(groups.count());
        })
    });
}

fn bench_keep_selection(c: &mut Criterion) {
    let music = music_records(10_000);
    c.bench_function("music_identity_decide_10k", |b| {
        b.iter(|| {
            let selector = KeepSelector::new(Profile::MusicIdentity).with_existence_check(|_| true);
            let mut claims = ClaimSet::new();
            let (groups, _) =
                ProfileMatcher::new(Profile::MusicIdentity).candidate_groups(music.clone());
            let decisions = groups.filter_map(|g| selector.decide(g, &mut claims)).count();
            black_box(decisions);
        })
    });
}

criterion_group!(benches, bench_grouping, bench_keep_selection);
criterion_main!(benches);
