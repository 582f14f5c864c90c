use std::fs;
use reconcile::core::config::Config;
use reconcile::core::error::ErrorKind;
use reconcile::core::reconciler::Reconciler;
use reconcile::report::reports::Report;

const STAMP: &str = "2010-04-14T02:53:24.620268";

fn redirect(key: &str, location: &str) -> String {
    format!("/type/redirect\t{}\t2\t{}\t{{\"location\": \"{}\"}}\n", key, STAMP, location)
}

fn edition(key: &str, body: &str) -> String {
    format!("/type/edition\t{}\t1\t{}\t{}\n", key, STAMP, body)
}

fn catalog_dump() -> String {
    [
        redirect("/books/OL001M", "/books/OL002M"),
        redirect("/books/OL002M", "/books/OL003M"),
        redirect("/works/OL001W", "/works/OL002W"),
        redirect("/works/OL002W", "/works/OL003W"),
        redirect("/authors/OL1A", "/authors/OL2A"),
        edition(
            "/books/OL003M",
            r#"{"key": "/books/OL003M", "works": [{"key": "/works/OL001W"}], "isbn_10": ["0201570513"], "covers": [1]}"#,
        ),
        edition(
            "/books/OL010M",
            r#"{"key": "/books/OL010M", "works": [{"key": "/works/OL010W"}], "ocaid": "otheritem", "source_records": ["ia:otheritem"]}"#,
        ),
    ]
    .concat()
}

fn setup() -> (tempfile::TempDir, Reconciler) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::rooted_at(dir.path());
    config.chunk_size = 128;
    config.batch_size = 2;
    config.workers = 2;

    let reconciler = Reconciler::new(config).unwrap();
    let config = &reconciler.config;
    fs::write(&config.ol_all_dump, catalog_dump()).unwrap();
    fs::write(
        &config.ia_physical_direct_dump,
        "1\titemid\tOL001M\tOL001W\n2\totheritem\t\t\nshort\trow\n",
    )
    .unwrap();
    (dir, reconciler)
}

#[test]
fn archive_item_resolves_to_terminal_work() {
    let (_dir, reconciler) = setup();

    let created = reconciler.create_db().unwrap();
    assert_eq!(created.archive_rows, 2);
    assert_eq!(created.editions, 2);
    assert_eq!(created.ingest.redirects, 4);
    assert_eq!(created.backfilled, 1);
    assert_eq!(created.covers, 1);

    let resolved = reconciler.resolve_redirects().unwrap();
    assert_eq!(resolved.redirects, 4);
    assert_eq!(resolved.mapping.conflicts, 0);
    assert_eq!(resolved.relink.linked, 1);

    let outcomes = reconciler.all_reports().unwrap();
    assert_eq!(outcomes.len(), Report::ALL.len());

    let path = reconciler.config.reports_dir.join(Report::ResolvedWorkFromEdition.file_name());
    assert_eq!(fs::read_to_string(path).unwrap(), "itemid\tOL003W\n");
}

#[test]
fn backfilled_edition_feeds_the_reports() {
    let (_dir, reconciler) = setup();
    reconciler.create_db().unwrap();
    reconciler.resolve_redirects().unwrap();
    reconciler.all_reports().unwrap();

    let path = reconciler.config.reports_dir.join(Report::OlHasOcaidIaHasNoEdition.file_name());
    assert_eq!(fs::read_to_string(path).unwrap(), "otheritem\tOL010M\n");
}

#[test]
fn second_create_db_refuses_a_stale_database() {
    let (_dir, reconciler) = setup();
    reconciler.create_db().unwrap();

    let err = reconciler.create_db().unwrap_err();
    assert_eq!(err.kind, ErrorKind::TableAlreadyExists);
}

#[test]
fn resolve_redirects_can_be_rerun() {
    let (_dir, reconciler) = setup();
    reconciler.create_db().unwrap();

    let first = reconciler.resolve_redirects().unwrap();
    let second = reconciler.resolve_redirects().unwrap();
    assert_eq!(first.redirects, second.redirects);
    assert_eq!(first.mapping.pairs, second.mapping.pairs);
    assert_eq!(first.relink.linked, second.relink.linked);
}
