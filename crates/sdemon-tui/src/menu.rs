//! Interactive menu rendering

use crossterm::style::Stylize;

use sdemon_app::MenuOption;

/// Prompt shown above the options
pub const MENU_PROMPT: &str = "What would you like to do?";

/// Cursor marking the selected option
pub const MENU_CURSOR: &str = "❯";

/// Lines of the menu, prompt first. No line endings.
pub fn menu_lines(selected: MenuOption, colored: bool) -> Vec<String> {
    let mut lines = Vec::with_capacity(MenuOption::ALL.len() + 1);
    lines.push(if colored {
        format!("{} {}", "?".green(), MENU_PROMPT.bold())
    } else {
        MENU_PROMPT.to_string()
    });

    for (index, option) in MenuOption::ALL.iter().enumerate() {
        let label = format!("{}. {}", index + 1, option.label());
        let line = match (*option == selected, colored) {
            (true, true) => format!("{} {}", MENU_CURSOR.cyan(), label.cyan()),
            (true, false) => format!("{} {}", MENU_CURSOR, label),
            (false, _) => format!("  {}", label),
        };
        lines.push(line);
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdemon_core::strip_ansi_codes;

    #[test]
    fn test_menu_restart_selected() {
        insta::assert_snapshot!(menu_lines(MenuOption::Restart, false).join("\n"), @r"
        What would you like to do?
        ❯ 1. Restart
          2. Show stdout
        ");
    }

    #[test]
    fn test_menu_show_stdout_selected() {
        insta::assert_snapshot!(menu_lines(MenuOption::ShowStdout, false).join("\n"), @r"
        What would you like to do?
          1. Restart
        ❯ 2. Show stdout
        ");
    }

    #[test]
    fn test_colored_menu_has_same_text() {
        let colored = menu_lines(MenuOption::ShowStdout, true);
        let plain = menu_lines(MenuOption::ShowStdout, false);

        assert_eq!(colored.len(), plain.len());
        assert!(colored[0].contains(MENU_PROMPT));
        assert_eq!(strip_ansi_codes(&colored[2]), plain[2]);
    }
}
