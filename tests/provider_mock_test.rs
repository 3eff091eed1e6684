//! Provider expectations verified with mockall

mod common;

use common::builders::text_query;
use common::mock_helpers::{TextProduct, TextQuery};
use mockall::mock;
use mockall::predicate::eq;
use qpipe::{ManagedPipeline, Provider};

mock! {
    pub Backend {}

    impl Provider<TextQuery, TextProduct> for Backend {
        fn fetch(&self, query: &TextQuery) -> anyhow::Result<Option<TextProduct>>;
    }
}

fn product(value: &str, query: &TextQuery) -> TextProduct {
    TextProduct {
        value: value.to_string(),
        query: query.clone(),
    }
}

#[test]
fn test_provider_called_once_per_stage() {
    let mut backend = MockBackend::new();
    backend
        .expect_fetch()
        .with(eq(text_query("ping")))
        .times(1)
        .returning(|q| Ok(Some(product("first", q))));
    backend
        .expect_fetch()
        .with(eq(text_query("first")))
        .times(1)
        .returning(|q| Ok(Some(product("second", q))));

    let result = ManagedPipeline::new(1, backend)
        .unwrap()
        .run(text_query("ping"))
        .run_map(|p: &TextProduct| TextQuery(p.value.clone()))
        .product()
        .unwrap()
        .unwrap();

    assert_eq!(result.value, "second");
    assert_eq!(result.query, text_query("first"));
}

#[test]
fn test_provider_error_yields_no_product() {
    let mut backend = MockBackend::new();
    backend
        .expect_fetch()
        .times(2)
        .returning(|q| {
            if q.0 == "bad" {
                Err(anyhow::anyhow!("backend unavailable"))
            } else {
                Ok(Some(product("good", q)))
            }
        });

    let products = ManagedPipeline::new(2, backend)
        .unwrap()
        .run_all(vec![text_query("bad"), text_query("fine")])
        .products()
        .unwrap();

    assert_eq!(products.len(), 1);
    assert_eq!(products[0].value, "good");
}

#[test]
fn test_empty_product_skips_remap() {
    let mut backend = MockBackend::new();
    backend.expect_fetch().times(1).returning(|_| Ok(None));

    let products = ManagedPipeline::new(1, backend)
        .unwrap()
        .run(text_query("nothing"))
        .run_map(|p: &TextProduct| TextQuery(p.value.clone()))
        .products()
        .unwrap();

    assert!(products.is_empty());
}
