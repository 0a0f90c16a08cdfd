//! The in-memory engine under concurrent use.

mod common;

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use common::{init_tracing, p};
use utsuwa_vfs::{ErrorKind, FileMode, Fs, MemoryFs, OpenFlags};

const THREADS: usize = 8;

#[test]
fn concurrent_appenders_lose_nothing() {
    init_tracing();
    let fs = MemoryFs::new();
    fs.write_all(p("/log"), b"HEAD").unwrap();

    thread::scope(|s| {
        for i in 0..THREADS {
            let fs = &fs;
            s.spawn(move || {
                let token = format!("T{i:03}");
                for _ in 0..50 {
                    let mut f = fs
                        .open_file(p("/log"), OpenFlags::append(), FileMode::new(0o644))
                        .unwrap();
                    f.write_all(token.as_bytes()).unwrap();
                    f.close().unwrap();
                }
            });
        }
    });

    let data = fs.read_all(p("/log")).unwrap();
    assert_eq!(data.len(), 4 + THREADS * 50 * 4);
    assert_eq!(&data[..4], b"HEAD");
    for chunk in data[4..].chunks(4) {
        assert_eq!(chunk[0], b'T');
        assert!(chunk[1..].iter().all(u8::is_ascii_digit), "torn write: {chunk:?}");
    }
    for i in 0..THREADS {
        let token = format!("T{i:03}");
        let count = data[4..].chunks(4).filter(|c| *c == token.as_bytes()).count();
        assert_eq!(count, 50, "{token}");
    }
    assert_eq!(fs.open_handles(), 0);
}

#[test]
fn two_appenders_leave_both_tokens() {
    let fs = MemoryFs::new();
    fs.write_all(p("/f"), b"base").unwrap();

    thread::scope(|s| {
        for token in [b"AAAA", b"BBBB"] {
            let fs = &fs;
            s.spawn(move || {
                let mut f = fs
                    .open_file(p("/f"), OpenFlags::append(), FileMode::new(0o644))
                    .unwrap();
                f.write_all(token).unwrap();
            });
        }
    });

    let data = fs.read_all(p("/f")).unwrap();
    assert_eq!(data.len(), 12);
    let tail = &data[4..];
    assert!(tail == b"AAAABBBB" || tail == b"BBBBAAAA", "{tail:?}");
}

#[test]
fn rename_is_atomic_to_observers() {
    init_tracing();
    let fs = MemoryFs::new();
    fs.mkdir(p("/a"), FileMode::new(0o755)).unwrap();
    fs.mkdir(p("/b"), FileMode::new(0o755)).unwrap();
    fs.mkdir(p("/a/x"), FileMode::new(0o755)).unwrap();
    fs.write_all(p("/a/x/f"), b"payload").unwrap();
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..500 {
                fs.rename(p("/a/x"), p("/b/x")).unwrap();
                fs.rename(p("/b/x"), p("/a/x")).unwrap();
            }
            done.store(true, Ordering::Release);
        });
        for _ in 0..2 {
            s.spawn(|| {
                while !done.load(Ordering::Acquire) {
                    let paths = fs.list();
                    let at_a = paths.iter().any(|e| e == "/a/x");
                    let at_b = paths.iter().any(|e| e == "/b/x");
                    assert!(at_a ^ at_b, "both or neither visible: {paths:?}");
                    let child_a = paths.iter().any(|e| e == "/a/x/f");
                    let child_b = paths.iter().any(|e| e == "/b/x/f");
                    assert_eq!((child_a, child_b), (at_a, at_b));
                }
            });
        }
    });

    assert!(fs.exists(p("/a/x/f")));
    assert!(!fs.exists(p("/b/x")));
    assert!(fs.inconsistencies().is_empty());
}

#[test]
fn remove_all_races_with_inserts() {
    init_tracing();
    let fs = MemoryFs::new();
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        for i in 0..4 {
            let fs = &fs;
            let done = &done;
            s.spawn(move || {
                let mut n = 0;
                while !done.load(Ordering::Acquire) {
                    let dir = format!("/t/w{i}/d{}", n % 5);
                    // Losing the race to remove_all is expected.
                    let _ = fs.mkdir_all(p(&dir), FileMode::new(0o755));
                    let _ = fs.write_all(p(&format!("{dir}/f{n}")), b"x");
                    n += 1;
                }
            });
        }
        s.spawn(|| {
            for _ in 0..300 {
                fs.remove_all(p("/t")).unwrap();
            }
            done.store(true, Ordering::Release);
        });
    });

    assert!(fs.inconsistencies().is_empty(), "{:?}", fs.inconsistencies());
    fs.remove_all(p("/t")).unwrap();
    assert_eq!(fs.list(), vec!["/"]);
}

#[test]
fn io_on_removed_file_races_with_remove() {
    init_tracing();
    let fs = MemoryFs::new();

    thread::scope(|s| {
        for i in 0..THREADS {
            let fs = &fs;
            s.spawn(move || {
                let path = format!("/f{}", i % 2);
                for _ in 0..200 {
                    let Ok(mut f) = fs.create(p(&path)) else {
                        continue;
                    };
                    f.write_all(b"data").unwrap();
                    let _ = fs.remove(p(&path));
                    let mut out = Vec::new();
                    f.write_all(b"more").unwrap();
                    f.close().unwrap();
                    assert!(f.read_to_end(&mut out).is_err());
                }
            });
        }
    });

    assert!(fs.inconsistencies().is_empty());
    assert_eq!(fs.open_handles(), 0);
}

#[test]
fn exactly_one_exclusive_create_wins() {
    let fs = MemoryFs::new();
    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    fs.open_file(p("/lock"), OpenFlags::create_exclusive(), FileMode::new(0o600))
                        .map(|_| ())
                        .map_err(|e| e.kind())
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.err())
            .all(|kind| kind == ErrorKind::Exist)
    );
}

#[test]
fn exactly_one_mkdir_wins() {
    let fs = MemoryFs::new();
    let wins: usize = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| s.spawn(|| fs.mkdir(p("/x"), FileMode::new(0o700)).is_ok() as usize))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });
    assert_eq!(wins, 1);
    assert_eq!(fs.list(), vec!["/", "/x"]);
}

#[test]
fn writers_on_different_files_proceed_independently() {
    let fs = MemoryFs::new();
    thread::scope(|s| {
        for i in 0..THREADS {
            let fs = &fs;
            s.spawn(move || {
                let path = format!("/file{i}");
                let mut f = fs.create(p(&path)).unwrap();
                for _ in 0..1000 {
                    f.write_all(&[i as u8]).unwrap();
                }
            });
        }
    });

    for i in 0..THREADS {
        let data = fs.read_all(p(&format!("/file{i}"))).unwrap();
        assert_eq!(data.len(), 1000);
        assert!(data.iter().all(|b| *b == i as u8));
    }
}
