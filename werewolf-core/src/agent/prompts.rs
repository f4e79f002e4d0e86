//! Prompt construction for language-model players.

use crate::roles::{Personality, Role};
use crate::state::StateSnapshot;

pub fn system_prompt(name: &str, role: Role, personality: Personality) -> String {
    let mut prompt = format!("You are the player {name} in a game of Werewolf.\n\n");
    prompt.push_str(match role {
        Role::Werewolf => include_str!("prompts/werewolf.txt"),
        Role::Villager => include_str!("prompts/villager.txt"),
    });
    prompt.push('\n');
    prompt.push_str(personality.traits());
    prompt.push_str(
        "\n\nStay in character and keep your behaviour consistent with your role \
         and personality for the whole game.",
    );
    prompt
}

pub fn night_prompt(view: &StateSnapshot, name: &str) -> String {
    let villagers: Vec<&str> = view
        .alive
        .iter()
        .filter(|p| view.role_of(p) == Some(Role::Villager))
        .map(String::as_str)
        .collect();

    let mut prompt = format!("It is night {}. The werewolves are hunting.\n\n", view.round);
    prompt.push_str(&format!("Alive players: {}\n", view.alive.join(", ")));
    prompt.push_str(&format!("Alive villagers: {}\n", list_or_none(&villagers)));
    let allies = view.werewolf_allies(name);
    if !allies.is_empty() {
        prompt.push_str(&format!("Your fellow werewolves: {}\n", allies.join(", ")));
    }
    prompt.push_str(
        "\nChoose the villager to kill tonight. Consider who threatens the \
         werewolves most during the day, who reasons best, and whose death \
         brings your side closest to winning.\n\n\
         Reply with JSON:\n\
         {\"target\": \"player name\", \"reasoning\": \"why this target\"}",
    );
    prompt
}

pub fn discussion_prompt(
    view: &StateSnapshot,
    role: Role,
    evidence: Option<&str>,
) -> String {
    let mut prompt = format!("Day {}: discussion.\n\n", view.round);
    prompt.push_str(&format!("Alive players: {}\n", view.alive.join(", ")));
    if !view.last_night_deaths.is_empty() {
        prompt.push_str(&format!(
            "Killed last night: {}\n",
            view.last_night_deaths.join(", ")
        ));
    }
    if !view.recent_discussion.is_empty() {
        prompt.push_str("\nWhat has been said so far:\n");
        for line in &view.recent_discussion {
            prompt.push_str(&format!("- {}: {}\n", line.player, line.speech));
        }
    }
    if let Some(evidence) = evidence.filter(|e| !e.trim().is_empty()) {
        prompt.push_str("\nRelevant earlier statements:\n");
        prompt.push_str(evidence);
        prompt.push('\n');
    }

    prompt.push_str(match role {
        Role::Werewolf => {
            "\nAs a werewolf you should pass as a villager, cast doubt carefully, \
             avoid exposing yourself, and steer suspicion toward villagers.\n"
        }
        Role::Villager => {
            "\nAs a villager you should analyse the situation, reason from what \
             people said and how they voted, and point out the most suspicious \
             player.\n"
        }
    });
    prompt.push_str(
        "\nReply with JSON:\n\
         {\"speech\": \"what you say to the table\", \
         \"suspicion\": \"the player you suspect most (optional)\", \
         \"reasoning\": \"your private reasoning\"}",
    );
    prompt
}

pub fn voting_prompt(view: &StateSnapshot, role: Role) -> String {
    let mut prompt = format!("Day {}: voting.\n\n", view.round);
    prompt.push_str(&format!("Alive players: {}\n", view.alive.join(", ")));
    prompt.push_str("\nThis round's statements:\n");
    if view.recent_discussion.is_empty() {
        prompt.push_str("(nobody spoke)\n");
    }
    for line in &view.recent_discussion {
        prompt.push_str(&format!("- {}: {}\n", line.player, line.speech));
    }

    prompt.push_str(match role {
        Role::Werewolf => {
            "\nAs a werewolf, vote to execute a villager: ideally one the table \
             already suspects, or one who threatens your side.\n"
        }
        Role::Villager => {
            "\nAs a villager, vote for the player you believe is most likely a \
             werewolf.\n"
        }
    });
    prompt.push_str(
        "\nReply with JSON:\n\
         {\"vote\": \"player name\", \"reasoning\": \"why\"}",
    );
    prompt
}

fn list_or_none(names: &[&str]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}
