use query_planner::ast::response_path::{PathSegment, ResponsePath};
use serde_json::Value;

use crate::response::graphql_error::GraphQLErrorPathSegment;

/// A concrete position in the response tree, list indices resolved.
pub type Position = Vec<GraphQLErrorPathSegment>;

/// Every object position matched by `path`, expanding `@` over list items.
/// Nulls and missing keys end a branch.
pub fn collect_positions(data: &Value, path: &ResponsePath) -> Vec<Position> {
    let mut positions = Vec::new();
    let mut current = Vec::new();
    collect_positions_at(data, path.segments(), &mut current, &mut positions);
    positions
}

fn collect_positions_at(
    data: &Value,
    remaining_path: &[PathSegment],
    current: &mut Position,
    positions: &mut Vec<Position>,
) {
    let Some((segment, rest_of_path)) = remaining_path.split_first() else {
        match data {
            Value::Object(_) => positions.push(current.clone()),
            // A list-typed field addressed without a trailing `@`.
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    current.push(GraphQLErrorPathSegment::Index(index));
                    collect_positions_at(item, &[], current, positions);
                    current.pop();
                }
            }
            _ => {}
        }
        return;
    };

    match (segment, data) {
        (PathSegment::List, Value::Array(items)) => {
            for (index, item) in items.iter().enumerate() {
                current.push(GraphQLErrorPathSegment::Index(index));
                collect_positions_at(item, rest_of_path, current, positions);
                current.pop();
            }
        }
        (PathSegment::Field(key), Value::Object(map)) => {
            if let Some(next_data) = map.get(key) {
                current.push(GraphQLErrorPathSegment::String(key.clone()));
                collect_positions_at(next_data, rest_of_path, current, positions);
                current.pop();
            }
        }
        _ => {}
    }
}

pub fn value_at<'a>(data: &'a Value, position: &[GraphQLErrorPathSegment]) -> Option<&'a Value> {
    position.iter().try_fold(data, |current, segment| match segment {
        GraphQLErrorPathSegment::String(key) => current.as_object()?.get(key),
        GraphQLErrorPathSegment::Index(index) => current.as_array()?.get(*index),
    })
}

pub fn value_at_mut<'a>(
    data: &'a mut Value,
    position: &[GraphQLErrorPathSegment],
) -> Option<&'a mut Value> {
    position
        .iter()
        .try_fold(data, |current, segment| match segment {
            GraphQLErrorPathSegment::String(key) => current.as_object_mut()?.get_mut(key),
            GraphQLErrorPathSegment::Index(index) => current.as_array_mut()?.get_mut(*index),
        })
}

#[cfg(test)]
mod tests {
    use query_planner::ast::response_path::ResponsePath;
    use serde_json::json;

    use super::{collect_positions, value_at};
    use crate::response::graphql_error::{display_path, GraphQLErrorPathSegment};

    #[test]
    fn expands_lists_and_skips_nulls() {
        let data = json!({
            "topProducts": [
                { "id": "1", "reviews": [{ "author": { "id": "a" } }, { "author": null }] },
                null,
                { "id": "3", "reviews": [{ "author": { "id": "b" } }] }
            ]
        });

        let positions = collect_positions(
            &data,
            &ResponsePath::from("topProducts.@.reviews.@.author"),
        );
        let printed: Vec<String> = positions.iter().map(|p| display_path(p)).collect();

        assert_eq!(
            printed,
            vec![
                "topProducts.0.reviews.0.author",
                "topProducts.2.reviews.0.author"
            ]
        );
        assert_eq!(
            value_at(&data, &positions[1]),
            Some(&json!({ "id": "b" }))
        );
    }

    #[test]
    fn root_is_a_single_position() {
        let data = json!({ "me": { "id": "1" } });
        assert_eq!(
            collect_positions(&data, &ResponsePath::root()),
            vec![Vec::<GraphQLErrorPathSegment>::new()]
        );
    }
}
