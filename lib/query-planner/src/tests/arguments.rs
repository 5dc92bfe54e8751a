use crate::{
    planner::error::{PlanCompilationError, PlannerError},
    tests::testkit::{build_query_plan, init_logger, PRODUCTS_FIXTURE},
    utils::parsing::parse_operation,
};
use std::error::Error;

#[test]
fn renames_fields_and_arguments_per_subgraph() -> Result<(), Box<dyn Error>> {
    init_logger();
    let document = parse_operation(
        r#"
        query {
          topProducts(first: 3) {
            title: name
            reviews(first: 2) {
              body
            }
          }
        }
        "#,
    );
    let query_plan = build_query_plan(PRODUCTS_FIXTURE, document)?;

    insta::assert_snapshot!(format!("{}", query_plan), @r#"
    QueryPlan {
      Sequence {
        Fetch(subgraph: "products") {
          {topProducts(first:3){title:title __typename id}}
        },
        Composite {
          Fetch(subgraph: "reviews", paths: ["topProducts.@"], lookup: ResolveByKey(Product)) {
            {...on Product{__typename id}} =>
            query($representations:[_Any!]!){_entities(representations:$representations){...on Product{reviews(limit:2){body}}}}
          },
        },
      },
    },
    "#);

    Ok(())
}

#[test]
fn variables_are_forwarded_with_their_definitions() -> Result<(), Box<dyn Error>> {
    init_logger();
    let document = parse_operation(
        r#"
        query ($limit: Int = 3) {
          topProducts {
            reviews(first: $limit) {
              body
            }
          }
        }
        "#,
    );
    let query_plan = build_query_plan(PRODUCTS_FIXTURE, document)?;

    let fetches = query_plan.fetch_nodes();
    assert_eq!(
        fetches[1].document,
        "query($representations:[_Any!]!,$limit:Int=3){_entities(representations:$representations){...on Product{reviews(limit:$limit){body}}}}"
    );
    assert_eq!(fetches[1].forwarded_variables().collect::<Vec<_>>(), vec!["limit"]);
    assert_eq!(fetches[0].forwarded_variables().count(), 0);

    Ok(())
}

#[test]
fn undefined_variables_are_rejected() {
    init_logger();
    let document = parse_operation("{ topProducts(first: $missing) { price } }");
    let result = build_query_plan(PRODUCTS_FIXTURE, document);

    assert!(matches!(
        result,
        Err(PlannerError::Compilation(PlanCompilationError::UndefinedVariable(name))) if name == "missing"
    ));
}
