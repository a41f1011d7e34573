//! Keyset pagination walks and filter behavior over a fixed snapshot.

use std::collections::BTreeSet;

use rstest::rstest;

use gazette_bookmarks::BookmarksService;
use gazette_core::{
    ListRequest, NewBookmark, ReadState, ReadStateFilter, ScopeFilter, SortColumn, SortOrder,
    SqliteBookmarkStore,
};

fn service() -> BookmarksService<SqliteBookmarkStore> {
    BookmarksService::new(SqliteBookmarkStore::open_in_memory().expect("in-memory store"))
}

fn saved(post: &str, title: &str, category: Option<&str>, state: ReadState) -> NewBookmark {
    NewBookmark {
        post_id: post.into(),
        title: title.into(),
        slug: title.to_lowercase().replace(' ', "-"),
        category: category.map(String::from),
        read_state: state,
        ..Default::default()
    }
}

/// Walk every page via the returned cursor, asserting no duplicates along
/// the way. Returns post ids in encounter order.
fn walk(
    service: &BookmarksService<SqliteBookmarkStore>,
    user: &str,
    request: &ListRequest,
) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut order = Vec::new();
    let mut cursor = None;
    for _ in 0..50 {
        let page = service
            .list_bookmarks(
                user,
                &ListRequest {
                    cursor: cursor.clone(),
                    ..request.clone()
                },
            )
            .unwrap();
        for row in &page.bookmarks {
            assert!(
                seen.insert(row.post_id.clone()),
                "duplicate row {} during walk",
                row.post_id
            );
            order.push(row.post_id.clone());
        }
        if !page.pagination.has_more {
            return order;
        }
        assert!(
            page.pagination.next_cursor.is_some(),
            "has_more without a cursor stalls the walk"
        );
        cursor = page.pagination.next_cursor;
    }
    panic!("pagination did not terminate");
}

fn seed_titles(service: &BookmarksService<SqliteBookmarkStore>, user: &str) -> Vec<String> {
    let titles = ["Alpha", "Bravo", "Charlie", "Delta", "Echo", "Foxtrot", "Golf"];
    for (i, title) in titles.iter().enumerate() {
        service
            .add_bookmark(
                user,
                saved(&format!("p{i}"), title, Some("News"), ReadState::Unread),
                &[],
            )
            .unwrap();
    }
    (0..titles.len()).map(|i| format!("p{i}")).collect()
}

#[test]
fn title_walks_are_exhaustive_in_both_directions() {
    let service = service();
    let all = seed_titles(&service, "u1");

    let asc = walk(
        &service,
        "u1",
        &ListRequest {
            limit: 2,
            sort_by: SortColumn::Title,
            sort_order: SortOrder::Asc,
            ..Default::default()
        },
    );
    assert_eq!(asc, all, "ascending title order is alphabetical");

    let desc = walk(
        &service,
        "u1",
        &ListRequest {
            limit: 3,
            sort_by: SortColumn::Title,
            sort_order: SortOrder::Desc,
            ..Default::default()
        },
    );
    let mut reversed = all.clone();
    reversed.reverse();
    assert_eq!(desc, reversed);
}

#[rstest]
#[case(SortColumn::CreatedAt, SortOrder::Asc)]
#[case(SortColumn::CreatedAt, SortOrder::Desc)]
#[case(SortColumn::Title, SortOrder::Asc)]
#[case(SortColumn::Title, SortOrder::Desc)]
#[case(SortColumn::ReadState, SortOrder::Asc)]
#[case(SortColumn::ReadState, SortOrder::Desc)]
fn every_sort_signature_walks_exhaustively(
    #[case] sort_by: SortColumn,
    #[case] sort_order: SortOrder,
) {
    let service = service();
    let all: BTreeSet<String> = seed_titles(&service, "u1").into_iter().collect();
    let visited = walk(
        &service,
        "u1",
        &ListRequest {
            limit: 2,
            sort_by,
            sort_order,
            ..Default::default()
        },
    );
    assert_eq!(visited.iter().cloned().collect::<BTreeSet<_>>(), all);
}

#[test]
fn created_at_walk_with_limit_one_covers_everything() {
    let service = service();
    let all: BTreeSet<String> = seed_titles(&service, "u1").into_iter().collect();
    let visited = walk(
        &service,
        "u1",
        &ListRequest {
            limit: 1,
            ..Default::default()
        },
    );
    assert_eq!(visited.iter().cloned().collect::<BTreeSet<_>>(), all);
}

#[test]
fn equal_sort_values_fall_back_to_the_id_tie_break() {
    let service = service();
    // Every row shares the same read_state, so ordering rests entirely on
    // the id tie-break.
    for i in 0..6 {
        service
            .add_bookmark(
                "u1",
                saved(&format!("p{i}"), &format!("T{i}"), None, ReadState::Unread),
                &[],
            )
            .unwrap();
    }
    let request = ListRequest {
        limit: 2,
        sort_by: SortColumn::ReadState,
        sort_order: SortOrder::Asc,
        ..Default::default()
    };
    let visited = walk(&service, "u1", &request);
    assert_eq!(visited.len(), 6);
}

#[test]
fn garbage_cursor_falls_back_to_the_first_page() {
    let service = service();
    seed_titles(&service, "u1");

    let fresh = service
        .list_bookmarks("u1", &ListRequest::default())
        .unwrap();
    let garbled = service
        .list_bookmarks(
            "u1",
            &ListRequest {
                cursor: Some("!!!not-a-cursor!!!".into()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(fresh.bookmarks, garbled.bookmarks);
    // A supplied cursor, even a broken one, is not a cold load.
    assert!(garbled.stats.is_none());
}

#[test]
fn changing_the_sort_silently_restarts_pagination() {
    let service = service();
    seed_titles(&service, "u1");

    let by_title = ListRequest {
        limit: 3,
        sort_by: SortColumn::Title,
        sort_order: SortOrder::Asc,
        ..Default::default()
    };
    let first = service.list_bookmarks("u1", &by_title).unwrap();
    let title_cursor = first.pagination.next_cursor.expect("more pages");

    // Same cursor, different sort: the cursor must be ignored.
    let by_created = ListRequest {
        limit: 3,
        cursor: Some(title_cursor),
        ..Default::default()
    };
    let restarted = service.list_bookmarks("u1", &by_created).unwrap();
    let fresh = service
        .list_bookmarks(
            "u1",
            &ListRequest {
                limit: 3,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(restarted.bookmarks, fresh.bookmarks);
}

#[test]
fn filtered_walks_only_visit_matching_rows() {
    let service = service();
    for (post, category, state) in [
        ("n1", Some("News"), ReadState::Unread),
        ("n2", Some("News"), ReadState::Read),
        ("s1", Some("Sport"), ReadState::InProgress),
        ("s2", Some("Sport"), ReadState::Read),
        ("x1", None, ReadState::Unread),
    ] {
        service
            .add_bookmark("u1", saved(post, post, category, state), &[])
            .unwrap();
    }

    let news = walk(
        &service,
        "u1",
        &ListRequest {
            limit: 1,
            category: Some("News".into()),
            ..Default::default()
        },
    );
    assert_eq!(news.iter().cloned().collect::<BTreeSet<_>>(),
        BTreeSet::from(["n1".to_string(), "n2".to_string()]));

    // The compound unread alias covers unread and in-progress.
    let unfinished = walk(
        &service,
        "u1",
        &ListRequest {
            limit: 2,
            read_state: ReadStateFilter::Unread,
            ..Default::default()
        },
    );
    assert_eq!(
        unfinished.iter().cloned().collect::<BTreeSet<_>>(),
        BTreeSet::from(["n1".to_string(), "s1".to_string(), "x1".to_string()])
    );

    let read_only = walk(
        &service,
        "u1",
        &ListRequest {
            read_state: ReadStateFilter::Exact(ReadState::Read),
            ..Default::default()
        },
    );
    assert_eq!(
        read_only.iter().cloned().collect::<BTreeSet<_>>(),
        BTreeSet::from(["n2".to_string(), "s2".to_string()])
    );
}

#[test]
fn edition_filter_distinguishes_null_from_value() {
    let service = service();
    let mut uk = saved("uk1", "UK story", None, ReadState::Unread);
    uk.edition_code = Some("en-GB".into());
    service.add_bookmark("u1", uk, &[]).unwrap();
    service
        .add_bookmark("u1", saved("g1", "Global story", None, ReadState::Unread), &[])
        .unwrap();

    let scoped = service
        .list_bookmarks(
            "u1",
            &ListRequest {
                edition: ScopeFilter::Equals("en-GB".into()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(scoped.bookmarks.len(), 1);
    assert_eq!(scoped.bookmarks[0].post_id, "uk1");

    let global = service
        .list_bookmarks(
            "u1",
            &ListRequest {
                edition: ScopeFilter::IsNull,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(global.bookmarks.len(), 1);
    assert_eq!(global.bookmarks[0].post_id, "g1");

    let everything = service
        .list_bookmarks("u1", &ListRequest::default())
        .unwrap();
    assert_eq!(everything.bookmarks.len(), 2);
}

#[test]
fn search_spans_fields_and_escapes_wildcards() {
    let service = service();
    service
        .add_bookmark(
            "u1",
            saved("p1", "Budget passes 50% threshold", None, ReadState::Unread),
            &[],
        )
        .unwrap();
    let mut with_note = saved("p2", "Quiet day", None, ReadState::Unread);
    with_note.note = Some("follow up on budget".into());
    service.add_bookmark("u1", with_note, &[]).unwrap();
    service
        .add_bookmark("u1", saved("p3", "Match report", None, ReadState::Unread), &[])
        .unwrap();

    let hits = service
        .list_bookmarks(
            "u1",
            &ListRequest {
                search: Some("budget".into()),
                ..Default::default()
            },
        )
        .unwrap();
    let posts: BTreeSet<String> = hits.bookmarks.iter().map(|r| r.post_id.clone()).collect();
    assert_eq!(posts, BTreeSet::from(["p1".to_string(), "p2".to_string()]));

    // A literal percent must not act as a wildcard.
    let exact = service
        .list_bookmarks(
            "u1",
            &ListRequest {
                search: Some("50%".into()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(exact.bookmarks.len(), 1);
    assert_eq!(exact.bookmarks[0].post_id, "p1");
}

#[test]
fn zero_limit_is_clamped_to_one_row_pages() {
    let service = service();
    seed_titles(&service, "u1");
    let page = service
        .list_bookmarks(
            "u1",
            &ListRequest {
                limit: 0,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(page.bookmarks.len(), 1);
    assert!(page.pagination.has_more);
    assert_eq!(page.pagination.limit, 1);
}
