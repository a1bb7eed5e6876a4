/// Listing engine - sorted, filtered, paginated actor listings
use crate::{
    actor_store::{display_or_unknown, ActorStore, PageRequest, SortDirection},
    error::{CastError, CastResult},
};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::{sqlite::SqliteRow, Row};
use std::fmt;

/// Fields an actor listing can be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Id,
    Name,
    Country,
    Birthday,
    Deathday,
    LastUpdate,
}

impl SortField {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "id" => Some(SortField::Id),
            "name" => Some(SortField::Name),
            "country" => Some(SortField::Country),
            "birthday" => Some(SortField::Birthday),
            "deathday" => Some(SortField::Deathday),
            "last-update" => Some(SortField::LastUpdate),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::Name => "name",
            SortField::Country => "country",
            SortField::Birthday => "birthday",
            SortField::Deathday => "deathday",
            SortField::LastUpdate => "last-update",
        }
    }

    fn column(&self) -> &'static str {
        match self {
            SortField::LastUpdate => "last_update",
            other => other.as_str(),
        }
    }
}

/// Fields an actor listing can display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayField {
    Id,
    Name,
    Country,
    Birthday,
    Deathday,
    LastUpdate,
    Shows,
}

impl DisplayField {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "id" => Some(DisplayField::Id),
            "name" => Some(DisplayField::Name),
            "country" => Some(DisplayField::Country),
            "birthday" => Some(DisplayField::Birthday),
            "deathday" => Some(DisplayField::Deathday),
            "last-update" => Some(DisplayField::LastUpdate),
            "shows" => Some(DisplayField::Shows),
            _ => None,
        }
    }

    /// Key used in the response object and in links
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayField::Id => "id",
            DisplayField::Name => "name",
            DisplayField::Country => "country",
            DisplayField::Birthday => "birthday",
            DisplayField::Deathday => "deathday",
            DisplayField::LastUpdate => "last-update",
            DisplayField::Shows => "shows",
        }
    }

    /// Backing column; shows live in their own table
    fn column(&self) -> Option<&'static str> {
        match self {
            DisplayField::Id => Some("id"),
            DisplayField::Name => Some("name"),
            DisplayField::Country => Some("country"),
            DisplayField::Birthday => Some("birthday"),
            DisplayField::Deathday => Some("deathday"),
            DisplayField::LastUpdate => Some("last_update"),
            DisplayField::Shows => None,
        }
    }
}

/// One ORDER BY key, written `+field` or `-field`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl OrderSpec {
    pub fn parse(token: &str) -> CastResult<Self> {
        let invalid = || CastError::Validation(format!("Order criteria {} is invalid", token));

        let direction = match token.chars().next() {
            Some('+') => SortDirection::Asc,
            Some('-') => SortDirection::Desc,
            _ => return Err(invalid()),
        };
        let field = SortField::from_str(&token[1..]).ok_or_else(invalid)?;

        Ok(Self { field, direction })
    }
}

impl fmt::Display for OrderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = match self.direction {
            SortDirection::Asc => '+',
            SortDirection::Desc => '-',
        };
        write!(f, "{}{}", sign, self.field.as_str())
    }
}

/// A validated listing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub order: Vec<OrderSpec>,
    pub page: i64,
    pub size: i64,
    pub filter: Vec<DisplayField>,
}

impl ListQuery {
    /// Validate raw tokens. Errors name the first offending token.
    pub fn parse<S: AsRef<str>>(order: &[S], page: i64, size: i64, filter: &[S]) -> CastResult<Self> {
        if page < 1 {
            return Err(CastError::Validation(format!("Page number {} is invalid", page)));
        }
        if size < 1 {
            return Err(CastError::Validation(format!("Size {} is invalid", size)));
        }

        let order = order
            .iter()
            .map(|token| OrderSpec::parse(token.as_ref()))
            .collect::<CastResult<Vec<_>>>()?;

        let mut fields = Vec::new();
        for token in filter {
            let field = DisplayField::from_str(token.as_ref()).ok_or_else(|| {
                CastError::Validation(format!("Filtering attribute {} is invalid", token.as_ref()))
            })?;
            if !fields.contains(&field) {
                fields.push(field);
            }
        }

        Ok(Self {
            order,
            page,
            size,
            filter: fields,
        })
    }

    /// Canonical link to `page` of this listing
    pub fn href(&self, base_url: &str, page: i64) -> String {
        let order = self
            .order
            .iter()
            .map(|spec| urlencoding::encode(&spec.to_string()).into_owned())
            .collect::<Vec<_>>()
            .join(",");
        let filter = self
            .filter
            .iter()
            .map(|field| field.as_str())
            .collect::<Vec<_>>()
            .join(",");

        format!(
            "{}/actors?order={}&page={}&size={}&filter={}",
            base_url, order, page, self.size, filter
        )
    }

    fn page_request(&self) -> PageRequest {
        // id is always fetched: shows are looked up by it
        let mut columns = vec!["id"];
        for column in self.filter.iter().filter_map(|field| field.column()) {
            if !columns.contains(&column) {
                columns.push(column);
            }
        }

        let mut order: Vec<_> = self
            .order
            .iter()
            .map(|spec| (spec.field.column(), spec.direction))
            .collect();
        // Tie-break on id so pages never overlap
        if !self.order.iter().any(|spec| spec.field == SortField::Id) {
            order.push(("id", SortDirection::Asc));
        }

        PageRequest {
            columns,
            order,
            limit: self.size,
            offset: (self.page - 1) * self.size,
        }
    }
}

/// HATEOAS link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub href: String,
}

/// Navigation links of a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageLinks {
    #[serde(rename = "self")]
    pub this: Link,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<Link>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<Link>,
}

/// One page of an actor listing
#[derive(Debug, Clone, Serialize)]
pub struct ActorPage {
    pub page: i64,
    #[serde(rename = "page-size")]
    pub page_size: i64,
    pub actors: Vec<Map<String, Value>>,
    #[serde(rename = "_links")]
    pub links: PageLinks,
}

/// Run a listing against the store
pub async fn list_actors(store: &ActorStore, query: &ListQuery, base_url: &str) -> CastResult<ActorPage> {
    let total = store.count().await?;
    if total == 0 {
        return Err(CastError::NotFound("There is no actor in the database".to_string()));
    }

    // total >= 1 here; avoids overflow for huge page sizes
    let total_pages = (total - 1) / query.size + 1;
    if query.page > total_pages {
        return Err(CastError::Validation(format!(
            "Page {} is out of range (Maximum page number is {})",
            query.page, total_pages
        )));
    }

    let rows = store.fetch_page(&query.page_request()).await?;

    let mut actors = Vec::with_capacity(rows.len());
    for row in rows {
        actors.push(render_row(store, &row, &query.filter).await?);
    }

    let link = |page: i64| Link {
        href: query.href(base_url, page),
    };
    let links = PageLinks {
        this: link(query.page),
        previous: (query.page > 1).then(|| link(query.page - 1)),
        next: (query.page < total_pages).then(|| link(query.page + 1)),
    };

    Ok(ActorPage {
        page: query.page,
        page_size: query.size,
        actors,
        links,
    })
}

async fn render_row(
    store: &ActorStore,
    row: &SqliteRow,
    fields: &[DisplayField],
) -> CastResult<Map<String, Value>> {
    let id: i64 = row.try_get("id")?;

    let mut actor = Map::new();
    for field in fields {
        let value = match field {
            DisplayField::Id => Value::from(id),
            DisplayField::Shows => Value::from(store.shows(id).await?),
            other => {
                let column = other.column().unwrap_or("id");
                let text: Option<String> = row.try_get(column)?;
                Value::String(display_or_unknown(&text))
            }
        };
        actor.insert(field.as_str().to_string(), value);
    }

    Ok(actor)
}
