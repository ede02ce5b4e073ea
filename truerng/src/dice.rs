use std::{fmt, str::FromStr};

use nom::{
    IResult, Parser,
    character::complete::{digit1, one_of, space0},
    combinator::{all_consuming, map, map_res, opt},
    sequence::{delimited, preceded},
};
use serde::{Deserialize, Serialize};

/// Turns a draw in (0, 1) into a face in `1..=sides`.
pub fn face(u: f64, sides: u32) -> u32 {
    ((u * f64::from(sides)).ceil() as u32).clamp(1, sides.max(1))
}

/// `NdM+K`: roll `count` dice with `sides` faces and add `modifier`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceFormula {
    count: u32,
    sides: u32,
    modifier: i32,
}

impl DiceFormula {
    pub fn new(count: u32, sides: u32, modifier: i32) -> anyhow::Result<Self> {
        if count == 0 || sides == 0 {
            anyhow::bail!("{count}d{sides} rolls no dice");
        }
        Ok(Self {
            count,
            sides,
            modifier,
        })
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn sides(&self) -> u32 {
        self.sides
    }

    pub fn modifier(&self) -> i32 {
        self.modifier
    }

    /// One draw from `uniform` per die.
    pub fn roll(&self, mut uniform: impl FnMut() -> f64) -> Roll {
        let faces: Vec<u32> = (0..self.count)
            .map(|_| face(uniform(), self.sides))
            .collect();
        let total = faces.iter().copied().map(i64::from).sum::<i64>() + i64::from(self.modifier);
        Roll {
            formula: *self,
            faces,
            total,
        }
    }
}

impl fmt::Display for DiceFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)?;
        match self.modifier {
            0 => Ok(()),
            m if m > 0 => write!(f, "+{m}"),
            m => write!(f, "{m}"),
        }
    }
}

impl FromStr for DiceFormula {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (_, (count, sides, modifier)) = all_consuming(delimited(space0, formula, space0))
            .parse(s)
            .map_err(|e| anyhow::anyhow!("Invalid dice formula {s:?}: {e}"))?;
        Self::new(count, sides, modifier)
    }
}

fn number(input: &str) -> IResult<&str, u32> {
    map_res(digit1, |s: &str| s.parse::<u32>()).parse(input)
}

fn modifier(input: &str) -> IResult<&str, i32> {
    let (input, sign) = one_of("+-").parse(input)?;
    let (input, value) = preceded(space0, map_res(digit1, |s: &str| s.parse::<i32>())).parse(input)?;
    Ok((input, if sign == '-' { -value } else { value }))
}

fn formula(input: &str) -> IResult<&str, (u32, u32, i32)> {
    (
        map(opt(number), |count| count.unwrap_or(1)),
        preceded(one_of("dD"), number),
        map(opt(preceded(space0, modifier)), |m| m.unwrap_or(0)),
    )
        .parse(input)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roll {
    pub formula: DiceFormula,
    pub faces: Vec<u32>,
    pub total: i64,
}

impl fmt::Display for Roll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {} {:?}", self.formula, self.total, self.faces)
    }
}
