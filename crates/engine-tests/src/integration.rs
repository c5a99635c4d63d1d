#[cfg(test)]
mod tests {
    use crate::utils::{
        MemoryFactory, RELOCATION, at, modified_documents, plain_documents, run_transit, settings,
    };
    use bson::{Bson, doc};
    use engine_config::settings::{TransitConfig, TransitSettings};
    use engine_core::progress::{ProgressNotifier, TransitPhase};
    use engine_runtime::execution::{
        CollectionOutcome, RepositoryFactory, prepare::CollectionPreparation,
    };
    use model::{execution::results::TransferResults, query::filter::SourceFilter};
    use std::{collections::HashMap, io::Write, time::Duration};
    use tokio_util::sync::CancellationToken;
    use tracing_test::traced_test;

    // Scenario: full mode, 1000 source documents without a checkpoint field, stale destination.
    // Expected Outcome:
    // - Preparation returns the empty filter and a count of 1000.
    // - The destination holds exactly the 1000 source documents.
    #[traced_test]
    #[tokio::test]
    async fn tc01() {
        let factory = MemoryFactory::new().with_collection(
            "orders",
            plain_documents(1000),
            [doc! { "_id": "stale" }],
        );

        let repositories = factory.repositories("orders");
        let prepared = CollectionPreparation::new(
            "orders",
            repositories.source,
            repositories.destination,
            ProgressNotifier::new("orders"),
        )
        .lag(None)
        .await
        .unwrap();
        assert_eq!(prepared.filter, SourceFilter::empty());
        assert_eq!(prepared.count, 1000);

        let report = run_transit(
            settings(r#"[{ "name": "orders" }]"#, ""),
            &factory,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        let orders = &report.collections["orders"];
        assert_eq!(
            orders.last,
            Some(CollectionOutcome::Transferred {
                expected: 1000,
                results: TransferResults::new(1000, 0, 0),
            })
        );

        let destination = factory.destination("orders");
        assert_eq!(destination.len(), 1000);
        assert!(destination.find_by_id(&Bson::String("stale".into())).is_none());
    }

    // Scenario: iterative mode, destination max `Modified` is T, offset 0.
    // Source has 2 documents before T, 5 at T and 3 after T.
    // Expected Outcome:
    // - Lag is 8 with the filter `Modified >= T`.
    // - Only those 8 documents are transferred, nothing is deleted.
    #[traced_test]
    #[tokio::test]
    async fn tc02() {
        let t = at(1_000);
        let mut source = modified_documents(0..2, at(500));
        source.extend(modified_documents(2..7, t));
        source.extend(modified_documents(7..10, at(2_000)));
        let factory = MemoryFactory::new().with_collection(
            "orders",
            source,
            [doc! { "_id": 100, "Modified": t }],
        );

        let settings = settings(
            r#"[{ "name": "orders", "iterative": { "field": "Modified", "offset_secs": 0 } }]"#,
            "",
        );
        let options = settings.collections[0].iterative.clone().unwrap();

        let repositories = factory.repositories("orders");
        let prepared = CollectionPreparation::new(
            "orders",
            repositories.source,
            repositories.destination,
            ProgressNotifier::new("orders"),
        )
        .lag(Some(&options))
        .await
        .unwrap();
        assert_eq!(prepared.filter, SourceFilter::iterative("Modified", Some(t)));
        assert_eq!(prepared.count, 8);

        let report = run_transit(settings, &factory, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.totals(), TransferResults::new(8, 0, 0));
        let destination = factory.destination("orders");
        assert_eq!(destination.len(), 9);
        assert!(destination.find_by_id(&Bson::Int32(0)).is_none());
    }

    // Scenario: iterative mode where the destination is already caught up.
    // Expected Outcome: the cycle is a no-op and no writes are issued.
    #[traced_test]
    #[tokio::test]
    async fn tc03() {
        let factory = MemoryFactory::new().with_collection(
            "orders",
            modified_documents(0..4, at(10)),
            [doc! { "_id": 0, "Modified": at(20) }],
        );

        let report = run_transit(
            settings(
                r#"[{ "name": "orders", "iterative": { "field": "Modified" } }]"#,
                "",
            ),
            &factory,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(
            report.collections["orders"].last,
            Some(CollectionOutcome::UpToDate)
        );
        assert_eq!(factory.destination("orders").bulk_calls(), 0);
        assert!(logs_contain("Nothing to transfer"));
    }

    // Scenario: two collections run concurrently, one has a non-datetime checkpoint.
    // Expected Outcome: the broken collection fails, its sibling completes.
    #[traced_test]
    #[tokio::test]
    async fn tc04() {
        let factory = MemoryFactory::new()
            .with_collection("orders", plain_documents(50), [])
            .with_collection(
                "invoices",
                modified_documents(0..5, at(10)),
                [doc! { "_id": 1, "Modified": "last tuesday" }],
            );

        let report = run_transit(
            settings(
                r#"[
                    { "name": "orders" },
                    { "name": "invoices", "iterative": { "field": "Modified" } }
                ]"#,
                "",
            ),
            &factory,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(report.has_failures());
        assert!(matches!(
            &report.collections["invoices"].last,
            Some(CollectionOutcome::Failed { error }) if error.contains("non-datetime")
        ));
        assert_eq!(report.collections["orders"].totals.processed, 50);
        assert_eq!(factory.destination("orders").len(), 50);
    }

    // Scenario: key fields resolved from the destination copy of each document.
    // The destination row of `_id` 1 carries an older `sku` than the source.
    // Expected Outcome: the write targets the destination row by its old key and replaces it.
    #[traced_test]
    #[tokio::test]
    async fn tc05() {
        let factory = MemoryFactory::new().with_collection(
            "products",
            [
                doc! { "_id": 1, "sku": "NEW-1", "Modified": at(50) },
                doc! { "_id": 2, "sku": "NEW-2", "Modified": at(50) },
            ],
            [doc! { "_id": 1, "sku": "OLD-1", "Modified": at(10) }],
        );

        let report = run_transit(
            settings(
                r#"[{
                    "name": "products",
                    "key_fields": ["sku"],
                    "fetch_key_from_destination": true,
                    "iterative": { "field": "Modified", "force_checkpoint": "1970-01-01T00:00:00Z" }
                }]"#,
                "",
            ),
            &factory,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.totals(), TransferResults::new(2, 0, 0));
        let destination = factory.destination("products");
        assert_eq!(destination.len(), 2);
        assert_eq!(
            destination.find_by_id(&Bson::Int32(1)).unwrap(),
            doc! { "_id": 1, "sku": "NEW-1", "Modified": at(50) }
        );
        assert_eq!(destination.key_lookups(), 2);
    }

    // Scenario: every fifth document needs a shard-key relocation, one of them keeps failing.
    // Expected Outcome: relocated documents land through the retry tier,
    // the stubborn one is failed.
    #[traced_test]
    #[tokio::test]
    async fn tc06() {
        let factory = MemoryFactory::new().with_collection("orders", plain_documents(200), []);
        let destination = factory.destination("orders");
        destination.fail_bulk_items(|doc| {
            (doc.get_i32("_id").ok()? % 5 == 0).then(|| RELOCATION.to_string())
        });
        destination.fail_single_writes(|doc| {
            (doc.get_i32("_id").ok()? == 100).then(|| "shard unavailable".to_string())
        });

        let report = run_transit(
            settings(r#"[{ "name": "orders" }]"#, ""),
            &factory,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.totals(), TransferResults::new(199, 40, 1));
        assert_eq!(destination.len(), 199);
        assert_eq!(destination.single_calls(), 40);
        assert!(logs_contain("orders-Retry01"));
    }

    // Test Settings: dry_run = true.
    // Expected Outcome: documents are counted as processed but the destination is untouched.
    #[traced_test]
    #[tokio::test]
    async fn tc07() {
        let factory = MemoryFactory::new().with_collection(
            "orders",
            plain_documents(100),
            [doc! { "_id": "keep-me" }],
        );

        let report = run_transit(
            settings(r#"[{ "name": "orders" }]"#, r#""dry_run": true,"#),
            &factory,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.totals().processed, 100);
        let destination = factory.destination("orders");
        assert_eq!(destination.documents(), vec![doc! { "_id": "keep-me" }]);
        assert_eq!(destination.mutations(), 0);
    }

    // Test Settings: loop = true, cycle_delay_secs = 60.
    // Scenario: shutdown is requested while waiting for the third cycle.
    // Expected Outcome: two complete cycles are reported and the run ends without error.
    #[tokio::test(start_paused = true)]
    async fn tc08() {
        let factory = MemoryFactory::new().with_collection("orders", plain_documents(30), []);
        let cancel = CancellationToken::new();

        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(90)).await;
            stopper.cancel();
        });

        let report = run_transit(
            settings(
                r#"[{ "name": "orders" }]"#,
                r#""loop": true, "cycle_delay_secs": 60,"#,
            ),
            &factory,
            cancel,
        )
        .await
        .unwrap();

        assert_eq!(report.cycles, 2);
        let orders = &report.collections["orders"];
        assert_eq!(orders.cycles, 2);
        assert_eq!(orders.totals.processed, 60);
        assert_eq!(factory.destination("orders").len(), 30);
    }

    // Scenario: shutdown is requested while batches are being written.
    // Expected Outcome: the run fails with a cancellation and the progress phase is Failed.
    #[tokio::test]
    async fn tc09() {
        let factory = MemoryFactory::new().with_collection("orders", plain_documents(500), []);
        factory.destination("orders").delay_writes(Duration::from_secs(30));
        let cancel = CancellationToken::new();

        let executor = engine_runtime::execution::TransitExecutor::new(
            settings(r#"[{ "name": "orders" }]"#, ""),
            std::sync::Arc::new(factory.clone()),
            cancel.clone(),
        );
        let progress = executor.progress("orders").unwrap().clone();

        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            stopper.cancel();
        });

        let err = executor.execute().await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(progress.phase(), TransitPhase::Failed);
        assert_eq!(factory.destination("orders").mutations(), 0);
    }

    // Scenario: configuration loaded from a file with an environment placeholder.
    // Expected Outcome: the placeholder is substituted and the transit runs with it.
    #[traced_test]
    #[tokio::test]
    async fn tc10() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "source": {{ "uri": "mongodb://${{SRC_HOST}}", "database": "app" }},
                "destination": {{ "uri": "mongodb://dst", "database": "app" }},
                "collections": [{{ "name": "${{COLLECTION}}", "batch_size": 7 }}]
            }}"#
        )
        .unwrap();

        let vars = HashMap::from([
            ("SRC_HOST".to_string(), "src:27017".to_string()),
            ("COLLECTION".to_string(), "users".to_string()),
        ]);
        let config = TransitConfig::load(file.path(), &vars).unwrap();
        let settings = TransitSettings::from_config(config).unwrap();
        assert_eq!(settings.source.uri, "mongodb://src:27017");

        let factory = MemoryFactory::new().with_collection("users", plain_documents(20), []);
        let report = run_transit(settings, &factory, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.totals().processed, 20);
        assert_eq!(factory.destination("users").bulk_calls(), 3);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["collections"]["users"]["last"]["status"], "transferred");
    }
}
