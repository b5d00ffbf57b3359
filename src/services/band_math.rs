//! Per-acquisition band arithmetic.
//!
//! Collectors describe derived indices (NDVI, NBR, RVI) as `BandExpr` trees.
//! The raster source evaluates the rendered expression on every pixel of every
//! acquisition before any temporal or spatial reduction. Test builds also get
//! `evaluate`, which applies the same formula to one pixel locally.

use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

#[derive(Debug, Clone, PartialEq)]
pub enum BandExpr {
    Band(&'static str),
    Const(f64),
    Add(Box<BandExpr>, Box<BandExpr>),
    Sub(Box<BandExpr>, Box<BandExpr>),
    Mul(Box<BandExpr>, Box<BandExpr>),
    Div(Box<BandExpr>, Box<BandExpr>),
}

impl BandExpr {
    pub fn band(name: &'static str) -> Self {
        BandExpr::Band(name)
    }

    pub fn constant(v: f64) -> Self {
        BandExpr::Const(v)
    }

    /// `(a - b) / (a + b)`
    pub fn normalized_difference(a: &'static str, b: &'static str) -> Self {
        (Self::band(a) - Self::band(b)) / (Self::band(a) + Self::band(b))
    }

    /// Source bands referenced by the expression, in first-use order.
    pub fn bands(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        self.collect_bands(&mut out);
        out
    }

    fn collect_bands(&self, out: &mut Vec<&'static str>) {
        match self {
            BandExpr::Band(name) => {
                if !out.contains(name) {
                    out.push(name);
                }
            }
            BandExpr::Const(_) => {}
            BandExpr::Add(a, b)
            | BandExpr::Sub(a, b)
            | BandExpr::Mul(a, b)
            | BandExpr::Div(a, b) => {
                a.collect_bands(out);
                b.collect_bands(out);
            }
        }
    }

    /// Evaluate against one pixel's band values.
    ///
    /// Returns `None` when a band is missing or a division has a zero
    /// denominator; the source masks such pixels out as well.
    #[cfg(test)]
    pub fn evaluate<F>(&self, lookup: &F) -> Option<f64>
    where
        F: Fn(&str) -> Option<f64>,
    {
        match self {
            BandExpr::Band(name) => lookup(name),
            BandExpr::Const(v) => Some(*v),
            BandExpr::Add(a, b) => Some(a.evaluate(lookup)? + b.evaluate(lookup)?),
            BandExpr::Sub(a, b) => Some(a.evaluate(lookup)? - b.evaluate(lookup)?),
            BandExpr::Mul(a, b) => Some(a.evaluate(lookup)? * b.evaluate(lookup)?),
            BandExpr::Div(a, b) => {
                let denom = b.evaluate(lookup)?;
                if denom == 0.0 {
                    return None;
                }
                Some(a.evaluate(lookup)? / denom)
            }
        }
    }
}

impl fmt::Display for BandExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BandExpr::Band(name) => write!(f, "{}", name),
            BandExpr::Const(v) => write!(f, "{}", v),
            BandExpr::Add(a, b) => write!(f, "({} + {})", a, b),
            BandExpr::Sub(a, b) => write!(f, "({} - {})", a, b),
            BandExpr::Mul(a, b) => write!(f, "({} * {})", a, b),
            BandExpr::Div(a, b) => write!(f, "({} / {})", a, b),
        }
    }
}

impl Add for BandExpr {
    type Output = BandExpr;
    fn add(self, rhs: BandExpr) -> BandExpr {
        BandExpr::Add(Box::new(self), Box::new(rhs))
    }
}

impl Sub for BandExpr {
    type Output = BandExpr;
    fn sub(self, rhs: BandExpr) -> BandExpr {
        BandExpr::Sub(Box::new(self), Box::new(rhs))
    }
}

impl Mul for BandExpr {
    type Output = BandExpr;
    fn mul(self, rhs: BandExpr) -> BandExpr {
        BandExpr::Mul(Box::new(self), Box::new(rhs))
    }
}

impl Div for BandExpr {
    type Output = BandExpr;
    fn div(self, rhs: BandExpr) -> BandExpr {
        BandExpr::Div(Box::new(self), Box::new(rhs))
    }
}
