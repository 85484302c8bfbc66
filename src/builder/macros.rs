//! Macros for declaring machine identifiers.

/// Declare an identifier enum and its `StateId` implementation.
///
/// Besides the trait, the generated enum gets an `ALL` slice in declaration
/// order and a `Display` impl printing the variant name. The `final:` and
/// `error:` lists are optional; identifiers not listed are neither.
///
/// # Example
///
/// ```
/// use pulsesync::core::StateId;
/// use pulsesync::state_enum;
///
/// state_enum! {
///     pub enum Link {
///         Down,
///         Training,
///         Up,
///         Faulted,
///     }
///     final: [Up, Faulted]
///     error: [Faulted]
/// }
///
/// assert_eq!(Link::ALL.len(), 4);
/// assert_eq!(Link::Training.to_string(), "Training");
/// assert!(Link::Faulted.is_error());
/// ```
#[macro_export]
macro_rules! state_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),* $(,)?
        }

        $(final: [$($final:ident),* $(,)?])?
        $(error: [$($error:ident),* $(,)?])?
    ) => {
        $(#[$meta])*
        #[derive(
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            Debug,
            serde::Serialize,
            serde::Deserialize,
        )]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),*
        }

        impl $name {
            /// Every identifier, in declaration order.
            pub const ALL: &[$name] = &[$($name::$variant),*];

            const FINAL: &[$name] = &[$($($name::$final),*)?];
            const ERROR: &[$name] = &[$($($name::$error),*)?];
        }

        impl $crate::core::StateId for $name {
            fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant)),*
                }
            }

            fn is_final(&self) -> bool {
                Self::FINAL.contains(self)
            }

            fn is_error(&self) -> bool {
                Self::ERROR.contains(self)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str($crate::core::StateId::name(self))
            }
        }
    };
}
