use crate::{
    planner::plan_nodes::PlanNode,
    tests::testkit::{build_query_plan, init_logger, PRODUCTS_FIXTURE},
    utils::parsing::parse_operation,
};
use std::error::Error;

#[test]
fn required_fields_from_parent_subgraph() -> Result<(), Box<dyn Error>> {
    init_logger();
    let document = parse_operation(
        r#"
        query {
          topProducts {
            shippingEstimate
          }
        }
        "#,
    );
    let query_plan = build_query_plan(PRODUCTS_FIXTURE, document)?;

    insta::assert_snapshot!(format!("{}", query_plan), @r#"
    QueryPlan {
      Sequence {
        Fetch(subgraph: "products") {
          {topProducts{__typename id price weight}}
        },
        Composite {
          Fetch(subgraph: "inventory", paths: ["topProducts.@"], lookup: ResolveByKey(Product)) {
            {...on Product{__typename id price weight}} =>
            query($representations:[_Any!]!){_entities(representations:$representations){...on Product{shippingEstimate}}}
          },
        },
      },
    },
    "#);

    Ok(())
}

#[test]
fn required_fields_fetched_before_consumer() -> Result<(), Box<dyn Error>> {
    init_logger();
    let document = parse_operation(
        r#"
        query {
          latestReviews {
            product {
              shippingEstimate
            }
          }
        }
        "#,
    );
    let query_plan = build_query_plan(PRODUCTS_FIXTURE, document)?;

    insta::assert_snapshot!(format!("{}", query_plan), @r#"
    QueryPlan {
      Sequence {
        Fetch(subgraph: "reviews") {
          {latestReviews{product{__typename id}}}
        },
        Composite {
          Fetch(subgraph: "products", paths: ["latestReviews.@.product"], lookup: ResolveByKey(Product)) {
            {...on Product{__typename id}} =>
            query($representations:[_Any!]!){_entities(representations:$representations){...on Product{price weight}}}
          },
        },
        Composite {
          Fetch(subgraph: "inventory", paths: ["latestReviews.@.product"], lookup: ResolveByKey(Product)) {
            {...on Product{__typename id price weight}} =>
            query($representations:[_Any!]!){_entities(representations:$representations){...on Product{shippingEstimate}}}
          },
        },
      },
    },
    "#);

    Ok(())
}

#[test]
fn requires_and_sibling_entity_fields_run_in_parallel() -> Result<(), Box<dyn Error>> {
    init_logger();
    let document = parse_operation(
        r#"
        query {
          topProducts {
            shippingEstimate
            inStock
          }
        }
        "#,
    );
    let query_plan = build_query_plan(PRODUCTS_FIXTURE, document)?;

    let Some(PlanNode::Sequence(sequence)) = &query_plan.node else {
        panic!("expected a sequence, got {:?}", query_plan.node);
    };
    assert_eq!(sequence.nodes.len(), 2);

    let fetches = query_plan.fetch_nodes();
    assert_eq!(fetches.len(), 3);
    assert!(fetches[1..].iter().all(|f| f.subgraph == "inventory"));
    assert!(fetches[1..]
        .iter()
        .any(|f| f.document.contains("{shippingEstimate}")));
    assert!(fetches[1..].iter().any(|f| f.document.contains("{inStock}")));

    Ok(())
}
