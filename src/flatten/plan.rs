//! Pre-computed row layouts
//!
//! A [`RowPlan`] is derived once from the column names of a writer. It splits
//! the columns into simple fields, which resolve without any loop index, and
//! array levels, one per depth at which some column expands a list. Every
//! structural conflict between sibling columns is reported here so that
//! writing a record can never hit one.

use crate::error::FieldConflictError;
use crate::types::{FieldPath, Segment};
use tracing::debug;

/// A declared column and its parsed path
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub path: FieldPath,
}

/// A column rendered for every index tuple of its level
#[derive(Debug, Clone, PartialEq)]
pub struct RenderField {
    /// Position of the column in the header
    pub column: usize,
    pub name: String,
    pub path: FieldPath,
}

/// A column holding the current loop index of a level
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayIdBinding {
    pub column: usize,
    pub name: String,
}

/// Path leading to the lists of a level
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayPrefix {
    /// Canonical spelling, used to name the prefix in errors
    pub name: String,
    pub segments: Vec<Segment>,
}

impl ArrayPrefix {
    fn new(segments: &[Segment]) -> Self {
        ArrayPrefix {
            name: FieldPath::new(segments.to_vec()).to_string(),
            segments: segments.to_vec(),
        }
    }
}

/// One depth at which columns expand a list
#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    /// Number of segments before the `[]`
    pub depth: usize,

    /// Distinct paths leading to the arrays at this depth, first-seen order
    pub prefixes: Vec<ArrayPrefix>,

    /// Columns with no deeper `[]`
    pub fields: Vec<RenderField>,

    /// `[id]` columns bound to this level
    pub ids: Vec<ArrayIdBinding>,
}

impl Level {
    fn has_prefix(&self, prefix: &[Segment]) -> bool {
        self.prefixes.iter().any(|p| p.segments == prefix)
    }
}

/// Complete layout for a list of column names
#[derive(Debug, Clone, PartialEq)]
pub struct RowPlan {
    pub columns: Vec<Column>,

    /// Indices of columns that need no loop index
    pub simple_fields: Vec<usize>,

    /// Array levels in ascending depth order
    pub levels: Vec<Level>,
}

impl RowPlan {
    /// Parse the column names and arrange them into levels
    pub fn new<S: AsRef<str>>(field_names: &[S]) -> Result<Self, FieldConflictError> {
        let columns: Vec<Column> = field_names
            .iter()
            .map(|name| Column {
                name: name.as_ref().to_string(),
                path: FieldPath::parse(name.as_ref()),
            })
            .collect();

        let simple_fields = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.path.is_simple())
            .map(|(i, _)| i)
            .collect();

        let mut levels = build_levels(&columns)?;
        bind_array_ids(&columns, &mut levels)?;

        debug!(
            columns = columns.len(),
            levels = levels.len(),
            ids = levels.iter().map(|l| l.ids.len()).sum::<usize>(),
            "built row plan"
        );

        Ok(RowPlan {
            columns,
            simple_fields,
            levels,
        })
    }

    pub fn field_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn has_arrays(&self) -> bool {
        !self.levels.is_empty()
    }
}

/// Group every `[]` column into depth-ordered levels.
///
/// Each path that expands a list at some depth is checked against the last
/// level emitted before it: the path must also expand a list at that level's
/// depth, and must reach it through one of that level's prefixes. Paths
/// containing `[id]` take part in the checks but contribute neither prefixes
/// nor render fields.
pub fn build_levels(columns: &[Column]) -> Result<Vec<Level>, FieldConflictError> {
    let max_depth = columns.iter().map(|c| c.path.len()).max().unwrap_or(0);
    let mut levels: Vec<Level> = Vec::new();

    for depth in 0..max_depth {
        let mut prefixes: Vec<ArrayPrefix> = Vec::new();
        let mut fields = Vec::new();

        for (index, column) in columns.iter().enumerate() {
            if !column.path.is_wildcard_at(depth) {
                continue;
            }

            let prefix = column.path.prefix(depth);
            if let Some(previous) = levels.last() {
                if !matches!(prefix[previous.depth], Segment::ArrayWildcard) {
                    return Err(FieldConflictError::NotArray {
                        field: column.name.clone(),
                        depth: previous.depth,
                    });
                }
                if !previous.has_prefix(&prefix[..previous.depth]) {
                    return Err(FieldConflictError::ArrayPrefix {
                        field: column.name.clone(),
                        depth,
                    });
                }
            }

            if column.path.array_id_position().is_some() {
                continue;
            }

            if !prefixes.iter().any(|p| p.segments == prefix) {
                prefixes.push(ArrayPrefix::new(prefix));
            }
            if !column.path.has_wildcard_after(depth) {
                fields.push(RenderField {
                    column: index,
                    name: column.name.clone(),
                    path: column.path.clone(),
                });
            }
        }

        if !prefixes.is_empty() {
            levels.push(Level {
                depth,
                prefixes,
                fields,
                ids: Vec::new(),
            });
        }
    }

    Ok(levels)
}

/// Attach every `[id]` column to the level whose depth matches its position.
pub fn bind_array_ids(columns: &[Column], levels: &mut [Level]) -> Result<(), FieldConflictError> {
    for (index, column) in columns.iter().enumerate() {
        let Some(position) = column.path.array_id_position() else {
            continue;
        };

        if position + 1 != column.path.len() {
            return Err(FieldConflictError::NonTerminalId {
                field: column.name.clone(),
            });
        }

        let level = levels
            .iter_mut()
            .find(|l| l.depth == position)
            .ok_or_else(|| FieldConflictError::NoEnclosingArray {
                field: column.name.clone(),
            })?;

        if !level.has_prefix(column.path.prefix(position)) {
            return Err(FieldConflictError::IdPrefixMismatch {
                field: column.name.clone(),
            });
        }

        level.ids.push(ArrayIdBinding {
            column: index,
            name: column.name.clone(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<Column> {
        names
            .iter()
            .map(|n| Column {
                name: n.to_string(),
                path: FieldPath::parse(n),
            })
            .collect()
    }

    fn prefixes(level: &Level) -> Vec<String> {
        level
            .prefixes
            .iter()
            .map(|p| p.name.clone())
            .collect()
    }

    fn render_names(level: &Level) -> Vec<&str> {
        level.fields.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_nested_root_arrays() {
        let levels = build_levels(&columns(&["[][].a", "[][].b"])).unwrap();

        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].depth, 0);
        assert_eq!(levels[0].prefixes[0].segments, Vec::<Segment>::new());
        assert_eq!(prefixes(&levels[0]), vec![""]);
        assert!(levels[0].fields.is_empty());
        assert_eq!(levels[1].depth, 1);
        assert_eq!(prefixes(&levels[1]), vec!["[]"]);
        assert_eq!(render_names(&levels[1]), vec!["[][].a", "[][].b"]);
    }

    #[test]
    fn test_sibling_arrays_share_levels() {
        let names = [
            "a.b[].d[]",
            "a.c[].e[].g",
            "a.c[].e[].f[0]",
            "a.b.[].d[][].e",
            "a.a.b",
        ];
        let levels = build_levels(&columns(&names)).unwrap();

        assert_eq!(levels.len(), 3);

        assert_eq!(levels[0].depth, 2);
        assert_eq!(prefixes(&levels[0]), vec!["a.b", "a.c"]);
        assert!(levels[0].fields.is_empty());

        assert_eq!(levels[1].depth, 4);
        assert_eq!(prefixes(&levels[1]), vec!["a.b[].d", "a.c[].e"]);
        assert_eq!(
            render_names(&levels[1]),
            vec!["a.b[].d[]", "a.c[].e[].g", "a.c[].e[].f[0]"]
        );
        assert_eq!(levels[1].fields[2].column, 2);

        assert_eq!(levels[2].depth, 5);
        assert_eq!(prefixes(&levels[2]), vec!["a.b[].d[]"]);
        assert_eq!(render_names(&levels[2]), vec!["a.b.[].d[][].e"]);
    }

    #[test]
    fn test_conflicts() {
        let cases: [&[&str]; 7] = [
            // array level differs at the root
            &["a.b[]", "b[]"],
            // sub-array at a different depth
            &["a.b[].d[]", "a.c[].e.f[]"],
            // prefix matches but the level does not
            &["a.b[]", "a[]"],
            &["a.b[]", "[].a"],
            // an [id] column with a misplaced array still conflicts
            &["a.b[]", "a.c.d[][id]"],
            &["k[]", "a.b[].c[]"],
            &["a[].x.y[]", "b[]", "c[].q[]"],
        ];

        for names in cases {
            let err = build_levels(&columns(names)).unwrap_err();
            assert!(
                matches!(err, FieldConflictError::NotArray { .. }),
                "{:?} gave {:?}",
                names,
                err
            );
        }
    }

    #[test]
    fn test_conflict_reports_field_and_depth() {
        let err = build_levels(&columns(&["a.b[]", "b[]"])).unwrap_err();
        assert_eq!(
            err,
            FieldConflictError::NotArray {
                field: "a.b[]".to_string(),
                depth: 1
            }
        );

        let err = build_levels(&columns(&["a[].b[]", "c[].d[]", "a[].x.y[]"])).unwrap_err();
        assert_eq!(
            err,
            FieldConflictError::NotArray {
                field: "a[].x.y[]".to_string(),
                depth: 3
            }
        );
    }

    #[test]
    fn test_array_prefix_conflict() {
        // `c[]` is an [id] path, so it never became a prefix of level 1
        let err = build_levels(&columns(&["a[].b[]", "c[].b[][id]"])).unwrap_err();
        assert_eq!(
            err,
            FieldConflictError::ArrayPrefix {
                field: "c[].b[][id]".to_string(),
                depth: 3
            }
        );
    }

    #[test]
    fn test_sibling_prefixes_at_every_level() {
        let levels = build_levels(&columns(&["a[]", "a[].x[]", "b[].x[]"])).unwrap();
        assert_eq!(prefixes(&levels[0]), vec!["a", "b"]);
        assert_eq!(render_names(&levels[0]), vec!["a[]"]);
        assert_eq!(prefixes(&levels[1]), vec!["a[].x", "b[].x"]);
    }

    #[test]
    fn test_grouping_is_order_independent() {
        let names = ["a.a[]", "a.b[].c", "a.b[].d[]", "a.c"];
        let forward = build_levels(&columns(&names)).unwrap();
        let mut reversed_names = names;
        reversed_names.reverse();
        let reversed = build_levels(&columns(&reversed_names)).unwrap();

        assert_eq!(forward.len(), reversed.len());
        for (f, r) in forward.iter().zip(&reversed) {
            assert_eq!(f.depth, r.depth);
            let mut fp = prefixes(f);
            let mut rp = prefixes(r);
            fp.sort();
            rp.sort();
            assert_eq!(fp, rp);
        }

        let conflict = ["b[]", "a.b[]"];
        assert!(build_levels(&columns(&conflict)).is_err());
    }

    #[test]
    fn test_array_ids_bind_to_levels() {
        let plan = RowPlan::new(&["a[].b", "a[].c[]", "a[id]", "a[].c[id]"]).unwrap();

        assert_eq!(plan.levels.len(), 2);
        assert_eq!(plan.levels[0].ids[0].name, "a[id]");
        assert_eq!(plan.levels[0].ids[0].column, 2);
        assert_eq!(plan.levels[1].ids[0].name, "a[].c[id]");
        assert!(plan.simple_fields.is_empty());
    }

    #[test]
    fn test_invalid_array_ids() {
        let err = RowPlan::new(&["a[]", "b[id]"]).unwrap_err();
        assert!(matches!(err, FieldConflictError::IdPrefixMismatch { .. }));

        let err = RowPlan::new(&["a[].b", "a[id].b"]).unwrap_err();
        assert!(matches!(err, FieldConflictError::NonTerminalId { .. }));

        let err = RowPlan::new(&["a[]", "a[][id]"]).unwrap_err();
        assert!(matches!(err, FieldConflictError::NoEnclosingArray { .. }));

        let err = RowPlan::new(&["x[id]"]).unwrap_err();
        assert!(matches!(err, FieldConflictError::NoEnclosingArray { .. }));
    }

    #[test]
    fn test_simple_fields() {
        let plan = RowPlan::new(&["a.b.c", "a.d[].e", "b", "b.d[0]"]).unwrap();
        assert_eq!(plan.simple_fields, vec![0, 2, 3]);
        assert!(plan.has_arrays());
        assert_eq!(plan.field_names(), vec!["a.b.c", "a.d[].e", "b", "b.d[0]"]);

        let empty = RowPlan::new::<&str>(&[]).unwrap();
        assert!(!empty.has_arrays());
        assert!(empty.columns.is_empty());
    }
}
