use super::types::{RequiredReturnTier, RuinTier};

/// Upper edge of a classification band.
#[derive(Debug, Clone, Copy)]
enum Edge {
    Below(f64),
    AtMost(f64),
}

impl Edge {
    fn admits(self, value: f64) -> bool {
        match self {
            Edge::Below(bound) => value < bound,
            Edge::AtMost(bound) => value <= bound,
        }
    }
}

/// Bands checked in order; anything no band admits, NaN included, is `otherwise`.
struct Bands<T: 'static> {
    bounded: &'static [(Edge, T)],
    otherwise: T,
}

impl<T: Copy + PartialEq> Bands<T> {
    fn classify(&self, value: f64) -> T {
        self.bounded
            .iter()
            .find(|(edge, _)| edge.admits(value))
            .map_or(self.otherwise, |(_, tier)| *tier)
    }

    #[cfg(test)]
    fn rank(&self, tier: T) -> usize {
        self.bounded
            .iter()
            .position(|(_, t)| *t == tier)
            .unwrap_or(self.bounded.len())
    }
}

/// Ruin probability (percent) bands.
const RUIN_TIERS: Bands<RuinTier> = Bands {
    bounded: &[
        (Edge::Below(1.0), RuinTier::Excellent),
        (Edge::AtMost(5.0), RuinTier::Safe),
        (Edge::AtMost(10.0), RuinTier::Decent),
        (Edge::AtMost(20.0), RuinTier::NotBad),
        (Edge::AtMost(30.0), RuinTier::Shaky),
        (Edge::AtMost(40.0), RuinTier::NotRobust),
    ],
    otherwise: RuinTier::Lousy,
};

/// Required return (fraction) bands.
const REQUIRED_RETURN_TIERS: Bands<RequiredReturnTier> = Bands {
    bounded: &[
        (Edge::AtMost(0.001), RequiredReturnTier::Awesome),
        (Edge::Below(0.02), RequiredReturnTier::VerySecure),
        (Edge::Below(0.04), RequiredReturnTier::PrettyGood),
        (Edge::Below(0.06), RequiredReturnTier::Adequate),
        (Edge::Below(0.08), RequiredReturnTier::NeedsAttention),
        (Edge::Below(0.09), RequiredReturnTier::Dangerous),
    ],
    otherwise: RequiredReturnTier::VeryDangerous,
};

pub fn classify_ruin(prob_ruin_percent: f64) -> RuinTier {
    RUIN_TIERS.classify(prob_ruin_percent)
}

pub fn classify_required_return(rate: f64) -> RequiredReturnTier {
    REQUIRED_RETURN_TIERS.classify(rate)
}

pub fn ruin_message(tier: RuinTier, p5: f64, prob_ruin_percent: f64) -> String {
    let worst = format!("In the worst case you will have {p5} dollars left.");
    let trouble =
        format!("And the chance for you to get into financial trouble is: {prob_ruin_percent}%");
    match tier {
        RuinTier::Excellent => format!(
            "Congratulations, your financial situation is excellent! {worst} {trouble}"
        ),
        RuinTier::Safe => format!("Your condition is safe! {worst} {trouble}"),
        RuinTier::Decent => {
            format!("You have a pretty decent financial condition! {worst} {trouble}")
        }
        RuinTier::NotBad => format!("Your financial condition is not bad. {worst} {trouble}"),
        RuinTier::Shaky => {
            format!("Your financial condition is a bit shaky... {worst} {trouble}")
        }
        RuinTier::NotRobust => format!(
            "Hmm...It seems like your current financial situation is not robust enough...There is a {prob_ruin_percent}% chance you will not have enough money by the end of your life. In the worst case, you will have {p5} dollars..."
        ),
        RuinTier::Lousy => format!(
            "Oh no...It seems like your current financial situation is pretty lousy...There is a {prob_ruin_percent}% chance you will not have enough money by the end of your life. In the worst case, you will have {p5} dollars..."
        ),
    }
}

pub fn required_return_message(tier: RequiredReturnTier, rate: f64) -> String {
    let percent = rate * 100.0;
    match tier {
        RequiredReturnTier::Awesome => format!(
            "Congratulations, your financial condition is awesome, you don't need any investment to achieve your financial goals! Your required return is: {percent}%"
        ),
        RequiredReturnTier::VerySecure => format!(
            "Congratulations, your financial condition is very secure, just need a little bit investment to achieve your financial goals! Your required return is: {percent}%"
        ),
        RequiredReturnTier::PrettyGood => {
            format!("Your financial condition is pretty good. Your required return is: {percent}%")
        }
        RequiredReturnTier::Adequate => {
            format!("Your financial condition is ok. Your required return is: {percent}%")
        }
        RequiredReturnTier::NeedsAttention => format!(
            "Your financial condition requires some attention... Your required return is: {percent}%"
        ),
        RequiredReturnTier::Dangerous => format!(
            "Your financial condition is a bit dangerous... Your required return is: {percent}%"
        ),
        RequiredReturnTier::VeryDangerous => format!(
            "You are in a very dangerous financial condition.... Your required return is: {percent}% or above"
        ),
    }
}
