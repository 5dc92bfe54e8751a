use crate::{
    ast::normalization::{error::NormalizationError, normalize_operation},
    tests::testkit::{init_logger, read_fused_schema, PRODUCTS_FIXTURE},
    utils::parsing::parse_operation,
};
use std::error::Error;

fn normalize(source: &str, operation_name: Option<&str>) -> Result<String, NormalizationError> {
    let schema = read_fused_schema(PRODUCTS_FIXTURE);
    normalize_operation(&schema, &parse_operation(source), operation_name).map(|op| op.to_string())
}

#[test]
fn inlines_fragments_and_merges_fields() -> Result<(), Box<dyn Error>> {
    init_logger();
    let normalized = normalize(
        r#"
        query Q {
          productById(id: "1") {
            ...ProductFields
            ... on Product {
              price
            }
            name @skip(if: true)
          }
        }

        fragment ProductFields on Product {
          name
          price
        }
        "#,
        None,
    )?;

    insta::assert_snapshot!(normalized, @r#"query Q{productById(id:"1"){name price}}"#);

    Ok(())
}

#[test]
fn explicit_defaults_normalize_like_omitted_arguments() -> Result<(), Box<dyn Error>> {
    init_logger();
    let explicit = normalize("{ topProducts(first: 5) { reviews(first: 10) { body } } }", None)?;
    let omitted = normalize("{ topProducts { reviews { body } } }", None)?;

    assert_eq!(explicit, omitted);
    assert_eq!(omitted, "query{topProducts{reviews{body}}}");

    Ok(())
}

#[test]
fn merged_conditions_are_ored() -> Result<(), Box<dyn Error>> {
    init_logger();
    let normalized = normalize(
        r#"
        query ($a: Boolean!, $b: Boolean!) {
          productById(id: "1") {
            ... @include(if: $a) {
              name
            }
            ... @include(if: $b) {
              price
              name
            }
          }
        }
        "#,
        None,
    )?;

    insta::assert_snapshot!(
        normalized,
        @r#"query($a:Boolean!,$b:Boolean!){productById(id:"1"){name@when("$a || $b") price@include(if:$b)}}"#
    );

    Ok(())
}

#[test]
fn children_of_excluded_occurrences_stay_excluded() -> Result<(), Box<dyn Error>> {
    init_logger();
    let normalized = normalize(
        r#"
        query ($a: Boolean!) {
          productById(id: "1") @include(if: $a) {
            price
          }
          productById(id: "1") {
            name
          }
        }
        "#,
        None,
    )?;

    insta::assert_snapshot!(
        normalized,
        @r#"query($a:Boolean!){productById(id:"1"){price@include(if:$a) name}}"#
    );

    Ok(())
}

#[test]
fn keeps_fragments_on_abstract_types() -> Result<(), Box<dyn Error>> {
    init_logger();
    let normalized = normalize(
        r#"
        {
          node(id: "1") {
            id
            ... on Product {
              name
            }
            ... on Node {
              id
            }
          }
        }
        "#,
        None,
    )?;

    assert_eq!(normalized, r#"query{node(id:"1"){id ...on Product{name}}}"#);

    Ok(())
}

#[test]
fn selects_operations_by_name() {
    init_logger();
    let source = r#"
        query A { topProducts { name } }
        query B { latestReviews { body } }
    "#;

    assert_eq!(
        normalize(source, Some("B")).ok().as_deref(),
        Some("query B{latestReviews{body}}")
    );
    assert!(matches!(
        normalize(source, None),
        Err(NormalizationError::MultipleMatchingOperationsFound)
    ));
    assert!(matches!(
        normalize(source, Some("C")),
        Err(NormalizationError::SpecifiedOperationNotFound { operation_name }) if operation_name == "C"
    ));
}

#[test]
fn reports_normalization_errors() {
    init_logger();

    assert!(matches!(
        normalize("{ topProducts { unknown } }", None),
        Err(NormalizationError::FieldNotFoundInType { field_name, type_name })
            if field_name == "unknown" && type_name == "Product"
    ));
    assert!(matches!(
        normalize("{ topProducts { ...Missing } }", None),
        Err(NormalizationError::FragmentDefinitionNotFound { .. })
    ));
    assert!(matches!(
        normalize(
            "{ topProducts { ...A } } fragment A on Product { ...B } fragment B on Product { ...A }",
            None
        ),
        Err(NormalizationError::FragmentCycle { .. })
    ));
    assert!(matches!(
        normalize(r#"{ a: productById(id: "1") { id } a: productById(id: "2") { id } }"#, None),
        Err(NormalizationError::FieldConflict(_))
    ));
}
