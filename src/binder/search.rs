use crate::error::QueryParseError;
use crate::server::ParamVec;
use regex::Regex;
use serde_json::{json, Map, Value};

/// One compiled filter regex, keeping the literal it was parsed from.
#[derive(Debug, Clone)]
pub struct SearchRegex {
    raw: String,
    regex: Regex,
}

impl SearchRegex {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    #[must_use]
    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

impl PartialEq for SearchRegex {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

/// One filter constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Eq(String),
    Regex(SearchRegex),
}

/// Sort direction; only the literal `ASC` / `DESC` tokens parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Parsed list-query semantics: filter, sort, pagination.
///
/// Fed by the repeatable `filter=` and `sort=` query parameters plus
/// `offset=`/`limit=`. Filter grammar: `field[op]=value` with
/// `op ∈ {eq, regex}`; bare `field=value` is shorthand for `eq`;
/// `field[regex]=/pattern/flags` compiles the pattern with the given flags
/// (`i`, `m`, `s`, `x`). Sort grammar: `field=ASC|DESC`. Anything else is a
/// [`QueryParseError`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    filter: Vec<(String, FilterOp)>,
    sort: Vec<(String, SortDirection)>,
    offset: Option<u64>,
    limit: Option<u64>,
}

impl SearchQuery {
    /// Parse from the request's query parameters.
    ///
    /// Pairs other than `filter`/`sort`/`offset`/`limit` are ignored; they
    /// belong to other bindings. Repeated `filter`/`sort` pairs accumulate;
    /// a repeated field replaces its earlier constraint.
    pub fn parse(query_params: &ParamVec) -> Result<Self, QueryParseError> {
        let mut search = SearchQuery::default();
        for (key, value) in query_params {
            match key.as_ref() {
                "filter" => search.parse_filter(value)?,
                "sort" => search.parse_sort(value)?,
                "offset" => {
                    search.offset = Some(parse_page_value("offset", value)?);
                }
                "limit" => {
                    search.limit = Some(parse_page_value("limit", value)?);
                }
                _ => {}
            }
        }
        Ok(search)
    }

    /// Parse a single filter expression, e.g. `name[regex]=/^a/i`.
    pub fn parse_filter(&mut self, expression: &str) -> Result<(), QueryParseError> {
        let mut parts = expression.splitn(2, '=');
        let field_spec = parts.next().unwrap_or_default();
        let value = parts.next().unwrap_or_default();

        let (field, op) = match split_operator(field_spec) {
            Some((field, op)) => (field, op),
            None => {
                // bare `field=value` is `eq`
                self.put_filter(field_spec, FilterOp::Eq(value.to_string()));
                return Ok(());
            }
        };
        match op {
            "eq" => self.put_filter(field, FilterOp::Eq(value.to_string())),
            "regex" => {
                let regex = parse_regex_literal(field, value)?;
                self.put_filter(field, FilterOp::Regex(regex));
            }
            other => {
                return Err(QueryParseError::UnknownOperator {
                    op: other.to_string(),
                })
            }
        }
        Ok(())
    }

    /// Parse a single sort expression, e.g. `name=ASC`.
    pub fn parse_sort(&mut self, expression: &str) -> Result<(), QueryParseError> {
        let mut parts = expression.splitn(2, '=');
        let field = parts.next().unwrap_or_default();
        let direction = parts.next().unwrap_or_default();
        let direction = match direction {
            "ASC" => SortDirection::Asc,
            "DESC" => SortDirection::Desc,
            other => {
                return Err(QueryParseError::UnknownDirection {
                    dir: other.to_string(),
                })
            }
        };
        if let Some(entry) = self.sort.iter_mut().find(|(f, _)| f == field) {
            entry.1 = direction;
        } else {
            self.sort.push((field.to_string(), direction));
        }
        Ok(())
    }

    fn put_filter(&mut self, field: &str, op: FilterOp) {
        if let Some(entry) = self.filter.iter_mut().find(|(f, _)| f == field) {
            entry.1 = op;
        } else {
            self.filter.push((field.to_string(), op));
        }
    }

    #[must_use]
    pub fn filter(&self, field: &str) -> Option<&FilterOp> {
        self.filter
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, op)| op)
    }

    #[must_use]
    pub fn filters(&self) -> &[(String, FilterOp)] {
        &self.filter
    }

    #[must_use]
    pub fn sort(&self) -> &[(String, SortDirection)] {
        &self.sort
    }

    #[must_use]
    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    #[must_use]
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filter.is_empty() && self.sort.is_empty() && self.offset.is_none() && self.limit.is_none()
    }

    /// JSON rendering for logging and echo-style handlers:
    /// `{"filter": {"name": {"eq": "10"}}, "sort": {"name": "ASC"}, …}`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut filter = Map::new();
        for (field, op) in &self.filter {
            let rendered = match op {
                FilterOp::Eq(value) => json!({ "eq": value }),
                FilterOp::Regex(regex) => json!({ "regex": regex.as_str() }),
            };
            filter.insert(field.clone(), rendered);
        }
        let mut sort = Map::new();
        for (field, direction) in &self.sort {
            let token = match direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            sort.insert(field.clone(), Value::String(token.to_string()));
        }
        let mut out = Map::new();
        if !filter.is_empty() {
            out.insert("filter".to_string(), Value::Object(filter));
        }
        if !sort.is_empty() {
            out.insert("sort".to_string(), Value::Object(sort));
        }
        if let Some(offset) = self.offset {
            out.insert("offset".to_string(), json!(offset));
        }
        if let Some(limit) = self.limit {
            out.insert("limit".to_string(), json!(limit));
        }
        Value::Object(out)
    }
}

/// Split `field[op]` into its parts; `None` for a bare field.
fn split_operator(field_spec: &str) -> Option<(&str, &str)> {
    if !field_spec.ends_with(']') {
        return None;
    }
    let open = field_spec.rfind('[')?;
    let field = &field_spec[..open];
    let op = &field_spec[open + 1..field_spec.len() - 1];
    if field.is_empty() || op.is_empty() {
        return None;
    }
    Some((field, op))
}

/// Compile a `/pattern/flags` literal.
fn parse_regex_literal(field: &str, value: &str) -> Result<SearchRegex, QueryParseError> {
    let delimiters = || QueryParseError::RegexDelimiters {
        field: field.to_string(),
        value: value.to_string(),
    };
    let rest = value.strip_prefix('/').ok_or_else(delimiters)?;
    // the last slash separates pattern from flags, so patterns may contain /
    let close = rest.rfind('/').ok_or_else(delimiters)?;
    let pattern = &rest[..close];
    let flags = &rest[close + 1..];

    let compile_err = || QueryParseError::RegexCompile {
        field: field.to_string(),
        value: value.to_string(),
    };
    let mut inline = String::new();
    for flag in flags.chars() {
        match flag {
            'i' | 'm' | 's' | 'x' => inline.push(flag),
            _ => return Err(compile_err()),
        }
    }
    let full = if inline.is_empty() {
        pattern.to_string()
    } else {
        format!("(?{inline}){pattern}")
    };
    let regex = Regex::new(&full).map_err(|_| compile_err())?;
    Ok(SearchRegex {
        raw: value.to_string(),
        regex,
    })
}

fn parse_page_value(param: &'static str, value: &str) -> Result<u64, QueryParseError> {
    value
        .parse::<u64>()
        .map_err(|_| QueryParseError::InvalidPagination {
            param,
            value: value.to_string(),
        })
}
