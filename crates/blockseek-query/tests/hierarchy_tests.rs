use std::collections::BTreeSet;

use blockseek_query::datalog::Clause;
use blockseek_query::request::QueryShape;
use blockseek_query::{
    compile, Combinator, CompiledQuery, CompilerConfig, Condition, ConditionGroup, GroupSet,
    HierarchyOperator, HierarchyRelation, QueryRequest, QueryRequestV1,
};

fn swap_sides(s: &str) -> String {
    s.replace("?l-", "?x-").replace("?r-", "?l-").replace("?x-", "?r-")
}

/// Where clauses with sides swapped; or-join branches compared as sets.
fn normalized(q: &CompiledQuery, swap: bool) -> BTreeSet<String> {
    let fix = |s: String| if swap { swap_sides(&s) } else { s };
    q.query
        .where_clauses
        .iter()
        .map(|c| match c {
            Clause::OrJoin { vars, branches } => {
                let vars: BTreeSet<String> = vars.iter().map(|v| fix(v.to_string())).collect();
                let branches: BTreeSet<String> =
                    branches.iter().map(|b| fix(b.render())).collect();
                format!("or-join {vars:?} {branches:?}")
            }
            other => fix(other.render()),
        })
        .collect()
}

fn side(values: &[&str], combinator: Combinator) -> GroupSet {
    GroupSet::single(ConditionGroup::new(
        values.iter().map(|v| Condition::text(*v)).collect(),
        combinator,
    ))
}

#[test]
fn every_operator_equals_its_inverse_with_sides_swapped() -> anyhow::Result<()> {
    let config = CompilerConfig::default();
    let left = side(&["project", "active"], Combinator::And);
    let right = side(&["task", "todo"], Combinator::Or);

    for op in HierarchyOperator::ALL {
        let forward = QueryRequest::hierarchy(HierarchyRelation {
            left: left.clone(),
            operator: op,
            right: right.clone(),
        });
        let QueryShape::Hierarchy(relation) = &forward.shape else {
            unreachable!()
        };
        let backward = QueryRequest::hierarchy(relation.inverted());

        let a = compile(&forward, &config)?;
        let b = compile(&backward, &config)?;
        assert_eq!(normalized(&a, false), normalized(&b, true), "operator {op}");
        assert_eq!(a.query.rules, b.query.rules, "operator {op}");
    }
    Ok(())
}

#[test]
fn strict_operators_need_no_rules() -> anyhow::Result<()> {
    let config = CompilerConfig::default();
    for op in [HierarchyOperator::ChildOf, HierarchyOperator::ParentOf] {
        let compiled = compile(
            &QueryRequest::hierarchy(HierarchyRelation {
                left: side(&["a"], Combinator::And),
                operator: op,
                right: side(&["b"], Combinator::And),
            }),
            &config,
        )?;
        assert!(compiled.text.starts_with("[:find"));
        assert!(!compiled.text.contains(":rules"));
    }
    Ok(())
}

#[test]
fn linked_operator_emits_two_body_rule() -> anyhow::Result<()> {
    let compiled = blockseek_query::compile_json(
        r#"{"hierarchy":{"left":{"conditions":[{"value":"meeting"}]},
                         "operator":"bidirectional_child_of",
                         "right":{"conditions":[{"type":"page_reference","value":"Acme"}]}}}"#,
        &CompilerConfig::default(),
    )?;
    assert!(compiled.text.contains("(linked ?r-b ?l-b)"));
    assert!(compiled
        .text
        .contains("[(linked ?a ?b) [?b :block/parent ?a]]"));
    assert!(compiled
        .text
        .contains("[(linked ?a ?b) [?a :block/parent ?b]]"));
    Ok(())
}

#[test]
fn page_entity_hierarchy_is_rejected_at_the_boundary() {
    let err = QueryRequestV1::from_json_str(
        r#"{"entity":"page",
            "hierarchy":{"left":{"conditions":[{"value":"a"}]},
                         "operator":"child_of",
                         "right":{"conditions":[{"value":"b"}]}}}"#,
    )
    .and_then(|r| r.validate(&CompilerConfig::default()))
    .unwrap_err();
    assert_eq!(err.code(), "InvalidRequest");
}

#[test]
fn or_dominant_side_rejects_the_whole_query() {
    let or_of_ands = GroupSet::new(
        vec![
            ConditionGroup::all(vec![Condition::text("A"), Condition::text("B")]),
            ConditionGroup::all(vec![Condition::text("C")]),
        ],
        Combinator::Or,
    );
    let err = compile(
        &QueryRequest::hierarchy(HierarchyRelation {
            left: side(&["x"], Combinator::And),
            operator: HierarchyOperator::AncestorOf,
            right: or_of_ands,
        }),
        &CompilerConfig::default(),
    )
    .unwrap_err();
    assert_eq!(err.code(), "UnsupportedShape");
}
