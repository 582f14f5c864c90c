pub mod core;
pub mod mmap;
pub mod storage;
pub mod parse;
pub mod ingest;
pub mod relational;
pub mod resolve;
pub mod report;

/*
┌────────────────────────────────────────────────────────────────────────────────────────────┐
│                            RECONCILE STRUCT ARCHITECTURE                                    │
└────────────────────────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────────────── CORE LAYER ──────────────────────────────────────────┐
│                                                                                              │
│  ┌────────────────────────────────────────────────────────────────────────────────────┐    │
│  │                              struct Reconciler                                      │    │
│  │  ┌──────────────────────────────────────────────────────────────────────────────┐ │    │
│  │  │ config: Config                    // Paths, chunk size, batch size, workers   │ │    │
│  │  │ layout: StorageLayout             // Shard naming and report locations        │ │    │
│  │  │ create_db()                       // ia table, ingestion, ol table, covers    │ │    │
│  │  │ resolve_redirects()               // stores, resolved columns, re-link        │ │    │
│  │  │ all_reports()                     // TSV reports                              │ │    │
│  │  └──────────────────────────────────────────────────────────────────────────────┘ │    │
│  └────────────────────────────────────────────────────────────────────────────────────┘    │
│                                                                                              │
│  ┌──────────────────┐  ┌────────────────────┐  ┌───────────────────────────────────────┐  │
│  │ struct Config    │  │ struct ParsedEdition│  │ struct Resolution                     │  │
│  │ • sqlite_db      │  │ • edition_id        │  │ • terminal: String                    │  │
│  │ • redirect_db    │  │ • work_id: Option   │  │ • intermediates: Vec<String>          │  │
│  │ • mapping_db     │  │ • ocaid: Option     │  │ • update_pairs()                      │  │
│  │ • chunk_size     │  │ • isbn_13 / isbn_13s│  └───────────────────────────────────────┘  │
│  │ • batch_size     │  │ • has_* flags       │                                              │
│  │ • workers        │  └────────────────────┘  ┌───────────────────────────────────────┐  │
│  └──────────────────┘  ┌────────────────────┐  │ struct Error                          │  │
│                        │ struct ParsedRedirect│ │ • kind: ErrorKind                     │  │
│  ┌──────────────────┐  │ • origin_id         │  │ • context: String                     │  │
│  │ struct ChunkRange│  │ • destination_id    │  └───────────────────────────────────────┘  │
│  │ • start, end     │  └────────────────────┘                                              │
│  │ • path           │                                                                       │
│  └──────────────────┘                                                                       │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────── INGESTION LAYER ────────────────────────────────────────┐
│                                                                                              │
│  ┌────────────────────────────────────────────────────────────────────────────────────┐    │
│  │                          struct IngestionPipeline                                   │    │
│  │  ┌──────────────────────────────────────────────────────────────────────────────┐ │    │
│  │  │ workers: usize                    // cores - 1                              │ │    │
│  │  │ progress: Arc<AtomicUsize>        // chunks completed                       │ │    │
│  │  │ pool: rayon::ThreadPool           // results come back over a channel       │ │    │
│  │  └──────────────────────────────────────────────────────────────────────────────┘ │    │
│  └────────────────────────────────────────────────────────────────────────────────────┘    │
│                                                                                              │
│  ┌────────────────────┐  ┌──────────────────────┐  ┌────────────────────────────────┐     │
│  │ make_chunk_ranges  │  │ struct ChunkReader   │  │ struct ShardWriter             │     │
│  │ • line aligned     │  │ • MmapFile           │  │ • {stem}_{kind}_{hex}{suffix}  │     │
│  └────────────────────┘  │ • lines() -> fields  │  └────────────────────────────────┘     │
│                          └──────────────────────┘                                          │
│  ┌────────────────────┐  ┌──────────────────────┐                                          │
│  │ fn parse_line      │  │ mod isbn             │                                          │
│  │ • redirect/edition │  │ • to_isbn13          │                                          │
│  └────────────────────┘  └──────────────────────┘                                          │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌───────────────────────────────────── STORAGE LAYER ─────────────────────────────────────────┐
│                                                                                              │
│  ┌─────────────────────────────┐  ┌────────────────────┐  ┌─────────────────────────┐     │
│  │ struct KvStore              │  │ struct FileLock    │  │ struct Database (sqlite)│     │
│  │ • log: [len][crc][bincode]  │  │ • flock            │  │ • execute / query       │     │
│  │ • index: RwLock<HashMap>    │  └────────────────────┘  │ • stream_rows           │     │
│  │ impl KeyValueStore          │  ┌────────────────────┐  │ • execute_many / commit │     │
│  └─────────────────────────────┘  │ struct ErrorReport │  └─────────────────────────┘     │
│                                   └────────────────────┘                                   │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌───────────────────────────────────── RESOLVE LAYER ─────────────────────────────────────────┐
│                                                                                              │
│  create_redirects_db ──loads──> KvStore (origin -> destination)                            │
│        │                                                                                    │
│        └──before──> update_redirected_ids ──uses──> resolve_chain ──stages──> SpillFile    │
│                           │                                                                 │
│                           └──then──> create_resolved_edition_work_mapping ──> KvStore      │
│                                             │                                               │
│                                             └──then──> build_archive_work_from_edition_column
│                                                              │                              │
│                                                              └──feeds──> Report::run (TSV)  │
└──────────────────────────────────────────────────────────────────────────────────────────────┘
*/
