//! End-to-end loads into DuckDB

#![cfg(feature = "duckdb-backend")]

mod common;

use common::{code_list_csv, registry, write_fragment};
use registry_codes::config::LoaderConfig;
use registry_codes::database::{self, StorageBackend, TableRef};
use registry_codes::{
    DuckDBBackend, Pipeline, PipelineOptions, SchemaRegistry, TableOutcome, TableStatus,
};
use tempfile::tempdir;

fn write_all_tables(dir: &std::path::Path) {
    write_fragment(dir, "code_list", "a.csv", &code_list_csv("A", 5));
    write_fragment(dir, "code_list", "b.csv", "ICD10,A0,99\nSNOMED,B1,1\n");
    write_fragment(
        dir,
        "facility",
        "a.csv",
        "RFA01,true,\"[\"\"MSG1\"\"]\"\nRFA02,false,\n",
    );
    write_fragment(dir, "modality", "a.csv", "M1,1,0.25\nM2,0,\n");
}

#[tokio::test]
async fn test_load_every_table() {
    let dir = tempdir().unwrap();
    write_all_tables(dir.path());

    let registry = registry();
    let backend = DuckDBBackend::in_memory().unwrap();
    let pipeline = Pipeline::new(&registry, &backend, dir.path(), PipelineOptions::default());
    let report = pipeline.run(&[]).await.unwrap();

    assert!(report.is_success(), "{:?}", report);
    assert_eq!(report.get("code_list").unwrap().rows_written(), 6);
    assert_eq!(report.get("facility").unwrap().rows_written(), 2);
    assert_eq!(report.get("modality").unwrap().rows_written(), 2);

    assert_eq!(backend.count_rows(&TableRef::new("code_list")).await.unwrap(), 6);
}

#[tokio::test]
async fn test_reload_replaces_rows() {
    let dir = tempdir().unwrap();
    write_all_tables(dir.path());

    let registry = registry();
    let backend = DuckDBBackend::in_memory().unwrap();
    let pipeline = Pipeline::new(&registry, &backend, dir.path(), PipelineOptions::default());
    pipeline.run(&[]).await.unwrap();

    std::fs::remove_file(dir.path().join("code_list").join("b.csv")).unwrap();
    let report = pipeline.run(&["code_list".to_string()]).await.unwrap();

    assert_eq!(
        report.get("code_list"),
        Some(&TableOutcome::Loaded {
            rows_written: 5,
            clean: Default::default(),
            table: TableStatus::Existing,
        })
    );
    assert_eq!(backend.count_rows(&TableRef::new("code_list")).await.unwrap(), 5);
}

#[tokio::test]
async fn test_load_into_schema() {
    let dir = tempdir().unwrap();
    write_fragment(dir.path(), "code_list", "a.csv", &code_list_csv("A", 3));

    let registry = registry();
    let backend = DuckDBBackend::in_memory().unwrap();
    let options = PipelineOptions {
        schema: Some("extract".to_string()),
        ..Default::default()
    };
    let pipeline = Pipeline::new(&registry, &backend, dir.path(), options);
    let report = pipeline.run(&["code_list".to_string()]).await.unwrap();
    assert!(report.is_success(), "{:?}", report);

    let table = TableRef::in_schema("code_list", Some("extract"));
    assert!(backend.has_table(&table).await.unwrap());
    assert!(!backend.has_table(&TableRef::new("code_list")).await.unwrap());
    assert_eq!(backend.count_rows(&table).await.unwrap(), 3);
}

#[tokio::test]
async fn test_grant_rejected_before_storage() {
    let dir = tempdir().unwrap();
    let registry = registry();
    let backend = DuckDBBackend::in_memory().unwrap();
    let options = PipelineOptions {
        schema: Some("extract".to_string()),
        grant_role: Some("reader".to_string()),
        ..Default::default()
    };
    let pipeline = Pipeline::new(&registry, &backend, dir.path(), options);

    let err = pipeline.run(&[]).await.unwrap_err();
    assert!(err.is_config());
    assert!(!backend.has_table(&TableRef::new("code_list")).await.unwrap());
}

#[tokio::test]
async fn test_file_database_persists() {
    let dir = tempdir().unwrap();
    let tables_dir = dir.path().join("tables");
    write_fragment(&tables_dir, "code_list", "a.csv", &code_list_csv("A", 4));

    let mut config = LoaderConfig::duckdb(dir.path().join("codes.duckdb").to_string_lossy());
    config.load.tables_dir = tables_dir.clone();

    let registry = registry();
    {
        let backend = database::connect(&config).await.unwrap();
        let pipeline = Pipeline::new(
            &registry,
            backend.as_ref(),
            &tables_dir,
            PipelineOptions::from_config(&config),
        );
        pipeline.run(&["code_list".to_string()]).await.unwrap();
        backend.close().await.unwrap();
    }

    let backend = database::connect(&config).await.unwrap();
    assert_eq!(backend.backend_type(), "duckdb");
    assert_eq!(backend.count_rows(&TableRef::new("code_list")).await.unwrap(), 4);
}

#[tokio::test]
async fn test_builtin_registry_tables_created_when_empty() {
    let dir = tempdir().unwrap();
    let registry = SchemaRegistry::builtin().unwrap();
    for table in registry.table_names() {
        std::fs::create_dir_all(dir.path().join(&table)).unwrap();
    }

    let backend = DuckDBBackend::in_memory().unwrap();
    let pipeline = Pipeline::new(&registry, &backend, dir.path(), PipelineOptions::default());
    let report = pipeline.run(&[]).await.unwrap();

    assert!(report.is_success(), "{:?}", report);
    assert_eq!(report.total_rows(), 0);
    for table in registry.table_names() {
        assert_eq!(
            report.get(&table),
            Some(&TableOutcome::Empty {
                table: TableStatus::Created
            })
        );
        assert!(backend.has_table(&TableRef::new(table)).await.unwrap());
    }
}
