/// One page of a listing, numbered from 1.
#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: i64,
    pub num_pages: i64,
}

impl<T> Page<T> {
    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn previous_number(&self) -> i64 {
        self.number - 1
    }

    pub fn next_number(&self) -> i64 {
        self.number + 1
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Paginator {
    per_page: i64,
    count: i64,
}

impl Paginator {
    pub fn new(per_page: i64, count: i64) -> Paginator {
        Paginator { per_page: per_page.max(1), count: count.max(0) }
    }

    /// An empty listing still has one (empty) page.
    pub fn num_pages(&self) -> i64 {
        if self.count == 0 {
            1
        } else {
            (self.count + self.per_page - 1) / self.per_page
        }
    }

    /// Resolves the raw `page` parameter to an existing page number.
    /// Missing or non-integer values select the first page; integers
    /// below 1 or past the end select the last one.
    pub fn clamp(&self, requested: Option<&str>) -> i64 {
        let raw = match requested.map(str::trim) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return 1,
        };

        match raw.parse::<i64>() {
            Ok(n) if (1..=self.num_pages()).contains(&n) => n,
            Ok(_) => self.num_pages(),
            // too large for i64, but still a page number
            Err(_) if is_integer_literal(raw) => self.num_pages(),
            Err(_) => 1,
        }
    }

    pub fn offset(&self, number: i64) -> i64 {
        (number - 1) * self.per_page
    }

    pub fn per_page(&self) -> i64 {
        self.per_page
    }
}

fn is_integer_literal(raw: &str) -> bool {
    let digits = raw.strip_prefix(['+', '-']).unwrap_or(raw);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}
