//! Thread role assignment.
//!
//! Experiments pick a "source" thread and describe every other thread by
//! its logical position relative to that source, so the same role table
//! works no matter which raw thread id is measuring. Role tables are pure
//! functions of `(logical position, reach)`; no role state is stored.

/// A thread's rank relative to the chosen source thread.
///
/// Bijective onto `[0, members)`; position 0 is always the source.
#[inline]
pub fn logical_position(me: usize, source: usize, members: usize) -> usize {
    (me + members - source) % members
}

/// Roles in the sharing experiment.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SharingRole {
    /// Flushes the measured line and performs the timed operation.
    Active,
    /// Pulls the line into its own cache before the timed operation.
    Setup,
    /// Seeds the line's coherence state with the designated operation.
    SetupOwner,
    /// Sits out this configuration.
    Nothing,
}

/// Role table for the sharing experiment with fan-out `reach`.
///
/// Exactly one thread is active, the thread at logical position `reach`
/// owns the setup, positions 1..reach assist, everyone else does nothing.
/// `reach = 0` and `reach = members - 1` both fall out of the same
/// arithmetic.
#[inline]
pub fn sharing_role(position: usize, reach: usize) -> SharingRole {
    if position == 0 {
        SharingRole::Active
    } else if position < reach {
        SharingRole::Setup
    } else if position == reach {
        SharingRole::SetupOwner
    } else {
        SharingRole::Nothing
    }
}

/// Roles in the visibility experiment.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VisibilityRole {
    /// Performs the timed release-store.
    Active,
    /// Spins until it observes the stored value.
    Polling,
    /// Sits out this configuration.
    Nothing,
}

/// Role table for the visibility experiment with `pollers` polling threads.
#[inline]
pub fn visibility_role(position: usize, pollers: usize) -> VisibilityRole {
    if position == 0 {
        VisibilityRole::Active
    } else if position <= pollers {
        VisibilityRole::Polling
    } else {
        VisibilityRole::Nothing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_is_bijective_and_source_is_zero() {
        for members in 1..16 {
            for source in 0..members {
                let mut seen = vec![false; members];
                for me in 0..members {
                    let position = logical_position(me, source, members);
                    assert!(position < members);
                    assert!(!seen[position]);
                    seen[position] = true;
                }
                assert_eq!(logical_position(source, source, members), 0);
            }
        }
    }

    #[test]
    fn test_sharing_role_counts() {
        for members in 2..12 {
            for reach in 1..members {
                let roles: Vec<_> = (0..members).map(|p| sharing_role(p, reach)).collect();
                let count = |want: SharingRole| roles.iter().filter(|&&r| r == want).count();
                assert_eq!(count(SharingRole::Active), 1);
                assert_eq!(count(SharingRole::SetupOwner), 1);
                assert_eq!(count(SharingRole::Setup), reach - 1);
                assert_eq!(count(SharingRole::Nothing), members - reach - 1);
                assert_eq!(roles[reach], SharingRole::SetupOwner);
            }
        }
    }

    #[test]
    fn test_sharing_reach_extremes() {
        // reach 0: an active thread and no helpers at all.
        let roles: Vec<_> = (0..4).map(|p| sharing_role(p, 0)).collect();
        assert_eq!(roles[0], SharingRole::Active);
        assert!(roles[1..].iter().all(|&r| r == SharingRole::Nothing));

        // maximum fan-out: every non-source thread participates.
        let roles: Vec<_> = (0..4).map(|p| sharing_role(p, 3)).collect();
        assert!(!roles.contains(&SharingRole::Nothing));
    }

    #[test]
    fn test_four_thread_reach_two_layout() {
        let roles: Vec<_> = (0..4).map(|p| sharing_role(p, 2)).collect();
        assert_eq!(
            roles,
            vec![
                SharingRole::Active,
                SharingRole::Setup,
                SharingRole::SetupOwner,
                SharingRole::Nothing,
            ]
        );
    }

    #[test]
    fn test_visibility_roles() {
        let roles: Vec<_> = (0..5).map(|p| visibility_role(p, 2)).collect();
        assert_eq!(
            roles,
            vec![
                VisibilityRole::Active,
                VisibilityRole::Polling,
                VisibilityRole::Polling,
                VisibilityRole::Nothing,
                VisibilityRole::Nothing,
            ]
        );
    }
}
