use uuid::Uuid;

/// One synthetic monitored entity: an opaque digest id paired with the SQL
/// text it stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesTag {
    pub id: String,
    pub sql_text: String,
}

/// The full set of series tags labelling generated datapoints. The set size
/// is fixed at startup; refreshes replace every tag at once to simulate
/// cardinality churn.
pub struct TagSet {
    tags: Vec<SeriesTag>,
    count: usize,
    refresh_interval_secs: i64,
    last_refresh_secs: Option<i64>,
}

impl TagSet {
    pub fn new(count: usize, refresh_interval_secs: i64) -> Self {
        Self {
            tags: Vec::new(),
            count,
            refresh_interval_secs,
            last_refresh_secs: None,
        }
    }

    /// Regenerates every tag when the refresh interval has elapsed since the
    /// last refresh (always on the first call). The set is swapped as a
    /// whole; callers never observe a partially updated set.
    pub fn refresh(&mut self, report_secs: i64) {
        let due = match self.last_refresh_secs {
            None => true,
            Some(last) => report_secs - last >= self.refresh_interval_secs,
        };
        if !due {
            return;
        }

        self.tags = (0..self.count)
            .map(|i| SeriesTag {
                id: Uuid::new_v4().to_string(),
                sql_text: format!("SELECT COUNT(?) FROM t_{report_secs}_{i}"),
            })
            .collect();
        self.last_refresh_secs = Some(report_secs);
    }

    pub fn tags(&self) -> &[SeriesTag] {
        &self.tags
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}
