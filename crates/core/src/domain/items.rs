use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

pub const CATEGORY_COUNT: usize = 3;
/// Every valuation must price the full bundle at exactly this many points.
pub const VALUATION_BUDGET: u32 = 10;
pub const MAX_ITEM_VALUE: u32 = 10;
/// A category worth at least one point cannot hold more items than the budget.
pub const MAX_ITEM_COUNT: u32 = VALUATION_BUDGET;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Book,
    Hat,
    Ball,
}

impl Category {
    pub const ALL: [Category; CATEGORY_COUNT] = [Self::Book, Self::Hat, Self::Ball];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Book => "book",
            Self::Hat => "hat",
            Self::Ball => "ball",
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            Self::Book => "books",
            Self::Hat => "hats",
            Self::Ball => "balls",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::Book => 0,
            Self::Hat => 1,
            Self::Ball => 2,
        }
    }
}

impl std::str::FromStr for Category {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "book" | "books" => Ok(Self::Book),
            "hat" | "hats" => Ok(Self::Hat),
            "ball" | "balls" => Ok(Self::Ball),
            other => Err(DomainError::UnknownCategory(other.to_string())),
        }
    }
}

/// Total number of items per category in the shared pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemCounts([u32; CATEGORY_COUNT]);

impl ItemCounts {
    pub const fn new(counts: [u32; CATEGORY_COUNT]) -> Self {
        Self(counts)
    }

    pub fn get(&self, category: Category) -> u32 {
        self.0[category.index()]
    }

    pub fn as_array(&self) -> [u32; CATEGORY_COUNT] {
        self.0
    }

    /// Number of two-way splits of the pool, `∏(countᵢ + 1)`.
    pub fn partition_count(&self) -> usize {
        self.0.iter().map(|count| *count as usize + 1).product()
    }

    pub fn is_all_even(&self) -> bool {
        self.0.iter().all(|count| count % 2 == 0)
    }

    /// The whole pool viewed as one party's share.
    pub fn as_allocation(&self) -> Allocation {
        Allocation(self.0)
    }
}

/// Per-category item values for one party.
///
/// Construction through [`Valuation::new`] enforces the value range and the
/// budget rule (`valuation · counts == 10`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Valuation([u32; CATEGORY_COUNT]);

impl Valuation {
    pub fn new(values: [u32; CATEGORY_COUNT], counts: &ItemCounts) -> Result<Self, DomainError> {
        if values.iter().any(|value| *value > MAX_ITEM_VALUE) {
            return Err(DomainError::ValueOutOfRange { values });
        }
        if counts.0.iter().any(|count| *count > MAX_ITEM_COUNT) {
            return Err(DomainError::CountOutOfRange { counts: counts.0 });
        }

        let total = dot(&values, &counts.0)
            .ok_or(DomainError::OffBudget { values, counts: counts.0, total: u32::MAX })?;
        if total != VALUATION_BUDGET {
            return Err(DomainError::OffBudget { values, counts: counts.0, total });
        }

        Ok(Self(values))
    }

    /// Every integer triple in `[0, 10]³` that satisfies the budget rule for
    /// `counts`, with the book value varying slowest.
    pub fn normalized_cube(counts: &ItemCounts) -> Vec<Valuation> {
        let mut cube = Vec::new();
        for book in 0..=MAX_ITEM_VALUE {
            for hat in 0..=MAX_ITEM_VALUE {
                for ball in 0..=MAX_ITEM_VALUE {
                    let values = [book, hat, ball];
                    if dot(&values, &counts.0) == Some(VALUATION_BUDGET) {
                        cube.push(Self(values));
                    }
                }
            }
        }
        cube
    }

    pub fn get(&self, category: Category) -> u32 {
        self.0[category.index()]
    }

    pub fn values(&self) -> [u32; CATEGORY_COUNT] {
        self.0
    }

    pub fn l1_distance(&self, other: &Valuation) -> u32 {
        self.0.iter().zip(other.0.iter()).map(|(left, right)| left.abs_diff(*right)).sum()
    }

    /// Index of the most valued category; the first one wins on ties.
    pub fn top_category(&self) -> Category {
        let mut best = Category::Book;
        for category in Category::ALL {
            if self.get(category) > self.get(best) {
                best = category;
            }
        }
        best
    }
}

/// Item counts assigned to one party.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Allocation([u32; CATEGORY_COUNT]);

impl Allocation {
    pub const fn new(shares: [u32; CATEGORY_COUNT]) -> Self {
        Self(shares)
    }

    pub fn get(&self, category: Category) -> u32 {
        self.0[category.index()]
    }

    pub fn shares(&self) -> [u32; CATEGORY_COUNT] {
        self.0
    }

    pub fn fits_within(&self, counts: &ItemCounts) -> bool {
        self.0.iter().zip(counts.0.iter()).all(|(share, count)| share <= count)
    }

    pub fn validated(self, counts: &ItemCounts) -> Result<Self, DomainError> {
        if self.fits_within(counts) {
            Ok(self)
        } else {
            Err(DomainError::AllocationExceedsCounts { allocation: self.0, counts: counts.0 })
        }
    }

    /// The other party's share, or `None` when this allocation does not fit.
    pub fn complement(&self, counts: &ItemCounts) -> Option<Allocation> {
        let mut rest = [0; CATEGORY_COUNT];
        for (index, slot) in rest.iter_mut().enumerate() {
            *slot = counts.0[index].checked_sub(self.0[index])?;
        }
        Some(Self(rest))
    }

    /// True when both shares together claim no more than the pool holds.
    pub fn jointly_fits(&self, other: &Allocation, counts: &ItemCounts) -> bool {
        (0..CATEGORY_COUNT).all(|index| self.0[index] + other.0[index] <= counts.0[index])
    }

    /// True when the two shares split the pool exactly.
    pub fn partitions_with(&self, other: &Allocation, counts: &ItemCounts) -> bool {
        (0..CATEGORY_COUNT).all(|index| self.0[index] + other.0[index] == counts.0[index])
    }
}

impl fmt::Display for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = Category::ALL
            .iter()
            .map(|category| format!("{}={}", category.as_str(), self.get(*category)))
            .collect::<Vec<_>>();
        f.write_str(&rendered.join(" "))
    }
}

/// `None` on overflow.
fn dot(left: &[u32; CATEGORY_COUNT], right: &[u32; CATEGORY_COUNT]) -> Option<u32> {
    left.iter()
        .zip(right.iter())
        .try_fold(0u32, |total, (a, b)| a.checked_mul(*b).and_then(|term| total.checked_add(term)))
}
