//! Query Resolver
//!
//! Maps a free-text question to at most one SQL query using an ordered list
//! of trigger rules. Rules are plain data: a set of trigger phrases and a
//! query template. They are tried in priority order and the first rule whose
//! phrase appears in the lowercased question decides the outcome, even when
//! its query later returns no rows.

use serde::Serialize;

/// A trigger rule: fires when any of its phrases occurs in the question
#[derive(Clone, Debug)]
pub struct TriggerRule {
    pub name: String,
    pub phrases: Vec<String>,
    pub template: QueryTemplate,
}

impl TriggerRule {
    pub fn new(name: impl Into<String>, phrases: &[&str], template: QueryTemplate) -> Self {
        Self {
            name: name.into(),
            phrases: phrases.iter().map(|p| p.to_lowercase()).collect(),
            template,
        }
    }

    /// `question` must already be lowercased
    pub fn matches(&self, question: &str) -> bool {
        self.phrases.iter().any(|p| question.contains(p.as_str()))
    }
}

/// How a rule turns a question into SQL
#[derive(Clone, Debug)]
pub enum QueryTemplate {
    /// The query does not depend on the question
    Fixed(String),

    /// `SELECT <columns> FROM <relation> WHERE <species_column> = '<Species>'`
    SpeciesScoped {
        columns: Vec<String>,
        relation: String,
        species_column: String,
    },
}

impl QueryTemplate {
    pub fn species_scoped(columns: &[&str], relation: &str, species_column: &str) -> Self {
        QueryTemplate::SpeciesScoped {
            columns: columns.iter().map(ToString::to_string).collect(),
            relation: relation.into(),
            species_column: species_column.into(),
        }
    }

    fn bind(&self, species: Option<&str>) -> Option<String> {
        match self {
            QueryTemplate::Fixed(sql) => Some(sql.clone()),
            QueryTemplate::SpeciesScoped {
                columns,
                relation,
                species_column,
            } => species.map(|s| {
                format!(
                    "SELECT {} FROM {} WHERE {} = {}",
                    columns.join(", "),
                    relation,
                    species_column,
                    sql_literal(s)
                )
            }),
        }
    }

    fn needs_species(&self) -> bool {
        matches!(self, QueryTemplate::SpeciesScoped { .. })
    }
}

/// What to do when a species-scoped rule fires but no known species is named
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpeciesFallback {
    /// Bind this species anyway (canonical casing applied)
    Default(String),
    /// Give up on the question
    NoMatch,
}

/// A fully bound query chosen by a rule
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResolvedQuery {
    pub rule: String,
    pub sql: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub species: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Query(ResolvedQuery),
    NoMatch,
}

impl Resolution {
    pub fn query(&self) -> Option<&ResolvedQuery> {
        match self {
            Resolution::Query(q) => Some(q),
            Resolution::NoMatch => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct QueryResolver {
    rules: Vec<TriggerRule>,
    species: Vec<String>,
    fallback: SpeciesFallback,
}

impl Default for QueryResolver {
    fn default() -> Self {
        Self::hydroponics()
    }
}

impl QueryResolver {
    /// Empty resolver; every question is NoMatch until rules are added
    pub fn new(species: &[&str], fallback: SpeciesFallback) -> Self {
        Self {
            rules: Vec::new(),
            species: species.iter().map(|s| s.to_lowercase()).collect(),
            fallback,
        }
    }

    /// The built-in hydroponics rules. Questions about EC, pH or care
    /// schedules that name neither selada nor tomat are answered for tomat.
    pub fn hydroponics() -> Self {
        Self::new(&["selada", "tomat"], SpeciesFallback::Default("tomat".into()))
            .with_rule(TriggerRule::new(
                "ideal_ec",
                &["ec ideal"],
                QueryTemplate::species_scoped(&["ec_min", "ec_max"], "plants", "common_name"),
            ))
            .with_rule(TriggerRule::new(
                "ideal_ph",
                &["ph ideal"],
                QueryTemplate::species_scoped(&["ph_min", "ph_max"], "plants", "common_name"),
            ))
            .with_rule(TriggerRule::new(
                "care_schedule",
                &["jadwal perawatan"],
                QueryTemplate::species_scoped(
                    &["task", "frequency_days"],
                    "care_schedule",
                    "plant_common_name",
                ),
            ))
            .with_rule(TriggerRule::new(
                "plant_catalog",
                &["tumbuhan apa", "jenis tanaman"],
                QueryTemplate::Fixed("SELECT common_name, type, notes FROM plants LIMIT 5".into()),
            ))
            .with_rule(TriggerRule::new(
                "general_knowledge",
                &["pengetahuan umum"],
                QueryTemplate::Fixed("SELECT title, content FROM knowledge_base".into()),
            ))
    }

    /// Append a rule with the lowest priority
    pub fn with_rule(mut self, rule: TriggerRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Insert a rule at `priority` (0 = tried first)
    pub fn insert_rule(&mut self, priority: usize, rule: TriggerRule) {
        let index = priority.min(self.rules.len());
        self.rules.insert(index, rule);
    }

    pub fn with_fallback(mut self, fallback: SpeciesFallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn rules(&self) -> &[TriggerRule] {
        &self.rules
    }

    pub fn resolve(&self, question: &str) -> Resolution {
        let lowered = question.to_lowercase();

        let Some(rule) = self.rules.iter().find(|r| r.matches(&lowered)) else {
            return Resolution::NoMatch;
        };

        let species = if rule.template.needs_species() {
            self.bind_species(&lowered)
        } else {
            None
        };

        match rule.template.bind(species.as_deref()) {
            Some(sql) => {
                tracing::debug!(rule = %rule.name, query = %sql, "Resolved question");
                Resolution::Query(ResolvedQuery {
                    rule: rule.name.clone(),
                    sql,
                    species,
                })
            }
            None => {
                tracing::debug!(rule = %rule.name, "Rule matched but no species could be bound");
                Resolution::NoMatch
            }
        }
    }

    /// First known species mentioned in the question, else the fallback
    fn bind_species(&self, lowered: &str) -> Option<String> {
        self.species
            .iter()
            .find(|s| lowered.contains(s.as_str()))
            .map(|s| canonical_species(s))
            .or_else(|| match &self.fallback {
                SpeciesFallback::Default(s) => Some(canonical_species(s)),
                SpeciesFallback::NoMatch => None,
            })
    }
}

/// Catalog casing: first letter uppercase, the rest lowercase
pub fn canonical_species(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
