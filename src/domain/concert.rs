use serde::{Deserialize, Serialize};

/// A bookable event. `occupied` never exceeds `capacity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concert {
    pub name: String,
    pub capacity: u32,
    pub occupied: u32,
    pub sold_out: bool,
}

impl Concert {
    pub fn new(name: &str, capacity: u32) -> Self {
        Self {
            name: name.to_string(),
            capacity,
            occupied: 0,
            sold_out: capacity == 0,
        }
    }

    pub fn is_sold_out(&self) -> bool {
        self.sold_out || self.occupied >= self.capacity
    }

    /// Takes one place. Returns false without changing anything when no place is left.
    pub fn occupy_place(&mut self) -> bool {
        if self.is_sold_out() {
            return false;
        }
        self.occupied += 1;
        if self.occupied == self.capacity {
            self.sold_out = true;
        }
        true
    }
}

/// Concert definition used to seed a store from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcertSeed {
    pub name: String,
    pub capacity: u32,
}

impl ConcertSeed {
    pub fn to_concert(&self) -> Concert {
        Concert::new(&self.name, self.capacity)
    }
}
